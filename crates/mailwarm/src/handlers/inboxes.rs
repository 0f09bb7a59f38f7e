//! Inbox administration.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use mailwarm_core::{Inbox, InboxId, InboxUpdate, NewInbox, SendLogEntry};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Send log entries returned when no limit is given.
const DEFAULT_SENDS_LIMIT: u32 = 50;
const MAX_SENDS_LIMIT: u32 = 500;

pub async fn list_inboxes_handler(State(state): State<SharedState>) -> ApiResult<Json<Vec<Inbox>>> {
    Ok(Json(state.store.list_inboxes().await?))
}

pub async fn create_inbox_handler(
    State(state): State<SharedState>,
    Json(new): Json<NewInbox>,
) -> ApiResult<(StatusCode, Json<Inbox>)> {
    let inbox = state.store.create_inbox(new).await?;
    tracing::info!(inbox = %inbox.id, label = %inbox.label, "inbox created");
    Ok((StatusCode::CREATED, Json(inbox)))
}

pub async fn update_inbox_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(update): Json<InboxUpdate>,
) -> ApiResult<Json<Inbox>> {
    if update.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "nothing to update"));
    }
    let inbox = state.store.update_inbox(&InboxId::from(id), update).await?;
    Ok(Json(inbox))
}

pub async fn delete_inbox_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = InboxId::from(id);
    state.store.delete_inbox(&id).await?;
    tracing::info!(inbox = %id, "inbox deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SendsQuery {
    limit: Option<u32>,
}

pub async fn list_sends_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<SendsQuery>,
) -> ApiResult<Json<Vec<SendLogEntry>>> {
    let id = InboxId::from(id);
    state.store.get_inbox(&id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SENDS_LIMIT)
        .clamp(1, MAX_SENDS_LIMIT);
    Ok(Json(state.store.recent_sends(&id, limit).await?))
}
