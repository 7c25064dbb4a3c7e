pub mod api_error;
pub mod cid;
pub mod constants;
pub mod kvdb;
pub mod node_id;
pub mod schemas;
pub mod telemetry;
pub mod time_utils;
pub mod url_utils;
