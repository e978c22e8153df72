use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
};

pub mod cloudforge;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod logger;
pub mod svn;
pub mod trigger;
pub mod utils;

#[cfg(test)]
mod tests;

/// Builds the HTTP service.
///
/// * `GET /`: liveness.
/// * `POST /subversion4cloudforge/{provider}/notifyCommit`: commit
///   notifications from the Subversion hosting at `provider`, e.g.
///   `cloudforge.com`. Other methods get `405 Method Not Allowed`.
pub fn app(ctx: Arc<handlers::Context>) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            &format!("/{}/{{provider}}/notifyCommit", cloudforge::URL_NAME),
            post(cloudforge::webhook::notify_commit),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(ctx)
}

async fn index() -> String {
    format!("{} is awaiting commit notifications.\n", cloudforge::DISPLAY_NAME)
}
