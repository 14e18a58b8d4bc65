//! Request metrics middleware
//!
//! Labels by the matched route template so path parameters do not explode
//! label cardinality.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use shopboard_common::metrics::RequestMetrics;

/// Record count and latency for every routed request
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let tracker = RequestMetrics::start(request.method().as_str(), &endpoint);

    let response = next.run(request).await;
    tracker.finish(response.status().as_u16());
    response
}
