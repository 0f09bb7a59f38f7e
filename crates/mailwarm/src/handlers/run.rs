//! Manual tick trigger.

use axum::Json;
use axum::extract::State;
use mailwarm_core::TickReport;

use crate::error::ApiResult;
use crate::state::SharedState;

/// Runs one tick synchronously and returns its report.
pub async fn run_now_handler(State(state): State<SharedState>) -> ApiResult<Json<TickReport>> {
    Ok(Json(state.tick().await?))
}
