use anyhow::anyhow;
use std::net::SocketAddr;
use url::Url;

pub fn sanitize_url(url: &str) -> anyhow::Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("URL cannot be empty"));
    }

    if url.contains('\0') || url.contains('\r') || url.contains('\n') {
        return Err(anyhow!("URL contains invalid control characters"));
    }

    let parsed_url = Url::parse(url).map_err(|e| anyhow!("Invalid URL format: {}", e))?;

    match parsed_url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Unsupported URL scheme: {}", other)),
    }

    // Trailing slashes break naive endpoint concatenation downstream
    Ok(parsed_url.to_string().trim_end_matches('/').to_string())
}

pub fn parse_socket_addr(listen: &str) -> anyhow::Result<SocketAddr> {
    listen
        .parse::<SocketAddr>()
        .map_err(|e| anyhow!("Invalid listen address {}: {}", listen, e))
}
