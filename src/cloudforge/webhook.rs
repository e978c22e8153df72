use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    response::{IntoResponse, Response},
};
use hyper::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use tracing::debug;
use url::form_urlencoded;

use crate::cloudforge::NotifyParams;
use crate::handlers::{self, Context};
use crate::logger;
use crate::utils::pluralize;

/// `POST /subversion4cloudforge/{provider}/notifyCommit`
///
/// Parameters are read from the query string and, for form-encoded (or
/// untyped) bodies, from the body. The status is the only contract: 200
/// once the notification was handled, however many jobs it polled, and
/// 400 when it could not be.
pub async fn notify_commit(
    State(ctx): State<Arc<Context>>,
    Path(provider): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = logger::notify_span(&headers, &provider);

    let query = form_urlencoded::parse(query.as_deref().unwrap_or("").as_bytes());
    let form: &[u8] = if is_form(&headers) {
        &body
    } else {
        span.in_scope(|| debug!("ignoring body with content type {:?}", headers.get(CONTENT_TYPE)));
        &[]
    };
    let params = NotifyParams::from_pairs(query.chain(form_urlencoded::parse(form)));

    match span.in_scope(|| handlers::notify_commit(&ctx, &provider, &params)) {
        Ok(outcome) => {
            let n = outcome.triggered.len();
            (
                StatusCode::OK,
                format!(
                    "Scheduled polling of {n} {} for {}\n",
                    pluralize("job", n),
                    outcome.repository_root
                ),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    match headers.get(CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|media| {
                media
                    .trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            }),
    }
}
