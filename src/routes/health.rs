// ABOUTME: Health probe route for load balancers and uptime checks
// ABOUTME: Unauthenticated, reports service identity and current time

//! Health probe
//!
//! `GET /up` answers 200 without touching the database; orchestration
//! platforms poll it to decide whether the process should receive traffic.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::constants::service;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health probe route
    #[must_use]
    pub fn routes() -> Router {
        Router::new().route("/up", get(up_handler))
    }
}

async fn up_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": service::SERVER_NAME,
        "version": service::SERVER_VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn up_answers_without_auth() {
        let app = HealthRoutes::routes();
        let response = app
            .oneshot(Request::get("/up").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "apuntador-server");
    }
}
