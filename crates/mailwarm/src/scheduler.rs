//! In-process tick loop.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::state::SharedState;

/// Spawns a task that runs a tick immediately and then every `interval`.
///
/// A failed tick is logged and the loop carries on.
pub fn spawn(state: SharedState, interval: Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "self-scheduler enabled");
    tokio::spawn(async move {
        loop {
            if let Err(e) = state.tick().await {
                error!(error = %e, "scheduled tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use mailwarm_core::testing::{RecordingOutbound, ScriptedInbound, new_inbox};
    use mailwarm_core::{Orchestrator, SqliteStore, WarmupSettings};

    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn ticks_repeat_on_the_interval() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        store.create_inbox(new_inbox("warm")).await.unwrap();
        let inbound = Arc::new(ScriptedInbound::new());
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(RecordingOutbound::new()),
            inbound.clone(),
            WarmupSettings::default(),
        );
        let state = Arc::new(AppState::new(store, orchestrator, String::new()));

        let handle = spawn(state, Duration::from_millis(10));
        let waited = tokio::time::timeout(Duration::from_secs(10), async {
            while inbound.fetch_calls() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        handle.abort();

        assert!(waited.is_ok(), "scheduler stopped ticking");
    }
}
