use hyper::HeaderMap;
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Header carrying the id `tower_http` assigns to every request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .init();
    tracing::debug!("initialized logging infra");
}

/// A span tagging every log line of one notification with its request id
/// and provider.
pub fn notify_span(headers: &HeaderMap, provider: &str) -> Span {
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!("notify_commit", request_id = %request_id, provider = %provider)
}
