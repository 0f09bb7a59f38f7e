//! Peer pool administration.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use mailwarm_core::{InboxId, Peer, WarmupStore};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct AddPeerRequest {
    inbox_id: InboxId,
    #[serde(alias = "peer_email")]
    address: String,
    weight: Option<i64>,
}

pub async fn add_peer_handler(
    State(state): State<SharedState>,
    Json(request): Json<AddPeerRequest>,
) -> ApiResult<(StatusCode, Json<Peer>)> {
    let peer = state
        .store
        .add_peer(&request.inbox_id, &request.address, request.weight)
        .await?;
    Ok((StatusCode::CREATED, Json(peer)))
}

pub async fn list_peers_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Peer>>> {
    let id = InboxId::from(id);
    state.store.get_inbox(&id).await?;
    Ok(Json(state.store.list_peers(&id).await?))
}

pub async fn delete_peer_handler(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.remove_peer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
