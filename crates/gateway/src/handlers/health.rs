//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use shopboard_common::{ApiResponse, Result};
use std::future::Future;
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub cache: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

async fn check<F>(probe: F) -> CheckResult
where
    F: Future<Output = Result<()>>,
{
    let start = Instant::now();
    match probe.await {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        version: shopboard_common::VERSION.to_string(),
    }))
}

/// Readiness probe - checks the database and the cache
pub async fn ready(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<ReadyResponse>>) {
    let (database, cache) = tokio::join!(check(state.repo.ping()), check(state.cache.ping()));

    let all_healthy = database.is_up() && cache.is_up();
    let status = if all_healthy {
        StatusCode::OK
    } else {
        tracing::warn!(
            database = %database.status,
            cache = %cache.status,
            "Readiness check failed"
        );
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks { database, cache },
    };

    (status, Json(ApiResponse::ok(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopboard_common::AppError;

    #[tokio::test]
    async fn test_check_reports_failure_message() {
        let down = check(async {
            Err(AppError::CacheError {
                message: "refused".into(),
            })
        })
        .await;
        assert!(!down.is_up());
        assert!(down.error.unwrap().contains("refused"));

        let up = check(async { Ok(()) }).await;
        assert!(up.is_up());
        assert!(up.latency_ms.is_some());
    }
}
