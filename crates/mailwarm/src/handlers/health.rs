//! Unauthenticated landing and health endpoints.

use axum::Json;
use serde_json::{Value, json};

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "ok": true,
        "try": [
            "GET /health",
            "GET /inboxes          (requires header X-Admin-Token)",
            "POST /inboxes         (requires header X-Admin-Token)",
            "PATCH /inboxes/{id}   (requires header X-Admin-Token)",
            "DELETE /inboxes/{id}  (requires header X-Admin-Token)",
            "GET /inboxes/{id}/peers (requires header X-Admin-Token)",
            "GET /inboxes/{id}/sends (requires header X-Admin-Token)",
            "POST /peers           (requires header X-Admin-Token)",
            "DELETE /peers/{id}    (requires header X-Admin-Token)",
            "POST /run-now         (requires header X-Admin-Token)"
        ]
    }))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}
