//! Liveness and readiness endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::health::state::{Readiness, ReadinessState};
use crate::http::response::insert_retry_after;

/// Probe response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// `GET /live_check`: the process is up and serving.
pub async fn live_check() -> Json<ProbeStatus> {
    Json(ProbeStatus {
        status: "alive".to_string(),
        retryable: None,
    })
}

/// `GET /ready_check`: 200 only once the model is loaded.
pub async fn ready_check(State(readiness): State<Arc<ReadinessState>>) -> Response {
    let readiness = readiness.get();
    if readiness == Readiness::Ready {
        let body = ProbeStatus {
            status: readiness.as_str().to_string(),
            retryable: None,
        };
        return (StatusCode::OK, Json(body)).into_response();
    }

    let retryable = readiness == Readiness::Initializing;
    tracing::warn!(
        readiness = readiness.as_str(),
        retryable,
        "Readiness check failed: model not ready"
    );
    let body = ProbeStatus {
        status: readiness.as_str().to_string(),
        retryable: Some(retryable),
    };
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    if retryable {
        insert_retry_after(&mut response);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_check_is_unconditional() {
        let Json(body) = live_check().await;
        assert_eq!(body.status, "alive");
        assert_eq!(body.retryable, None);
    }

    #[tokio::test]
    async fn test_ready_check_follows_state() {
        let state = Arc::new(ReadinessState::new());
        let response = ready_check(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("retry-after"));

        state.mark_ready().unwrap();
        let response = ready_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failed_is_not_retryable() {
        let state = Arc::new(ReadinessState::new());
        state.mark_failed().unwrap();
        let response = ready_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.headers().contains_key("retry-after"));
    }
}
