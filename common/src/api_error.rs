use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid node identity")]
    InvalidNodeId,
    #[error("unknown event kind")]
    UnknownEventKind,
    #[error("malformed event payload")]
    MalformedEvent,
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match self {
            ApiError::InvalidNodeId => StatusCode::BAD_REQUEST,
            ApiError::UnknownEventKind => StatusCode::BAD_REQUEST,
            ApiError::MalformedEvent => StatusCode::BAD_REQUEST,
            ApiError::Any(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status_code, self.to_string()).into_response()
    }
}
