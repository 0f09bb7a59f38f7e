//! Axum router construction.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};

use crate::error::ApiError;
use crate::handlers;
use crate::state::SharedState;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Builds the admin API. Everything except `/` and `/health` requires the
/// admin token.
pub fn build_router(state: SharedState) -> Router {
    let admin = Router::new()
        .route(
            "/inboxes",
            get(handlers::inboxes::list_inboxes_handler)
                .post(handlers::inboxes::create_inbox_handler),
        )
        .route(
            "/inboxes/{id}",
            patch(handlers::inboxes::update_inbox_handler)
                .delete(handlers::inboxes::delete_inbox_handler),
        )
        .route(
            "/inboxes/{id}/peers",
            get(handlers::peers::list_peers_handler),
        )
        .route(
            "/inboxes/{id}/sends",
            get(handlers::inboxes::list_sends_handler),
        )
        .route("/peers", post(handlers::peers::add_peer_handler))
        .route("/peers/{id}", delete(handlers::peers::delete_peer_handler))
        .route("/run-now", post(handlers::run::run_now_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(handlers::health::root_handler))
        .route("/health", get(handlers::health::health_handler))
        .merge(admin)
        .with_state(state)
}

async fn require_admin(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| token == state.admin_token);

    if authorized {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "rejected request without a valid admin token");
        ApiError::unauthorized().into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use mailwarm_core::testing::{RecordingOutbound, ScriptedInbound, new_inbox};
    use mailwarm_core::{Orchestrator, SqliteStore, WarmupSettings};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::state::AppState;

    const TOKEN: &str = "s3cret";

    async fn test_state() -> (SharedState, Arc<RecordingOutbound>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let outbound = Arc::new(RecordingOutbound::new());
        let orchestrator = Orchestrator::new(
            store.clone(),
            outbound.clone(),
            Arc::new(ScriptedInbound::new()),
            WarmupSettings::default(),
        );
        let state = Arc::new(AppState::new(store, orchestrator, TOKEN.to_string()));
        (state, outbound)
    }

    async fn call(state: &SharedState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ADMIN_TOKEN_HEADER, TOKEN);
        let body = match body {
            Some(value) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = build_router(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_landing_need_no_token() {
        let (state, _) = test_state().await;
        for uri in ["/", "/health"] {
            let response = build_router(state.clone())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn admin_routes_require_the_token() {
        let (state, _) = test_state().await;

        let missing = build_router(state.clone())
            .oneshot(Request::builder().uri("/inboxes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/run-now")
                    .header(ADMIN_TOKEN_HEADER, "guess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let (status, _) = call(&state, "GET", "/inboxes", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn inbox_and_peer_lifecycle() {
        let (state, _) = test_state().await;

        let (status, created) = call(
            &state,
            "POST",
            "/inboxes",
            Some(json!({
                "label": "sales",
                "daily_target": 10,
                "smtp": {"host": "smtp.example.com", "username": "sales@example.com", "password": "pw"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["label"], "sales");
        assert!(created["smtp"].get("password").is_none());
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &state,
            "POST",
            "/inboxes",
            Some(json!({"label": "sales"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, peer) = call(
            &state,
            "POST",
            "/peers",
            Some(json!({"inbox_id": id, "peer_email": "peer@x.com", "weight": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(peer["weight"], 3);

        let (status, peers) = call(&state, "GET", &format!("/inboxes/{id}/peers"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(peers.as_array().unwrap().len(), 1);

        let (status, updated) = call(
            &state,
            "PATCH",
            &format!("/inboxes/{id}"),
            Some(json!({"active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["active"], false);

        let peer_id = peer["id"].as_i64().unwrap();
        let (status, _) = call(&state, "DELETE", &format!("/peers/{peer_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, "DELETE", &format!("/peers/{peer_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&state, "DELETE", &format!("/inboxes/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, "GET", &format!("/inboxes/{id}/sends"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn peers_for_unknown_inbox_are_rejected() {
        let (state, _) = test_state().await;
        let (status, body) = call(
            &state,
            "POST",
            "/peers",
            Some(json!({"inbox_id": "nope", "address": "peer@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn run_now_runs_a_tick_and_logs_sends() {
        let (state, outbound) = test_state().await;
        let mut new = new_inbox("warm");
        new.daily_target = 480;
        let inbox = state.store.create_inbox(new).await.unwrap();
        state
            .store
            .add_peer(&inbox.id, "peer@x.com", None)
            .await
            .unwrap();

        let (status, report) = call(&state, "POST", "/run-now", None).await;
        assert_eq!(status, StatusCode::OK);
        let outcomes = report["inboxes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 1);
        let sent = outcomes[0]["sent"].as_u64().unwrap();
        assert_eq!(usize::try_from(sent).unwrap(), outbound.sent().len());

        let (status, sends) = call(
            &state,
            "GET",
            &format!("/inboxes/{}/sends?limit=500", inbox.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sends.as_array().unwrap().len(), outbound.sent().len());
    }
}
