//! Shared state of the running service.

use std::sync::Arc;

use chrono::Utc;
use mailwarm_core::{Orchestrator, Result, SqliteStore, TickReport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

/// State handed to every handler and to the scheduler.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub orchestrator: Orchestrator,
    pub admin_token: String,
    tick_lock: Mutex<()>,
}

/// Reference-counted handle to [`AppState`].
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<SqliteStore>, orchestrator: Orchestrator, admin_token: String) -> Self {
        Self {
            store,
            orchestrator,
            admin_token,
            tick_lock: Mutex::new(()),
        }
    }

    /// Runs one tick now. Ticks from the scheduler and the API queue up
    /// behind each other instead of overlapping.
    pub async fn tick(&self) -> Result<TickReport> {
        let _guard = self.tick_lock.lock().await;
        let mut rng = StdRng::from_entropy();
        self.orchestrator.run_once(Utc::now(), &mut rng).await
    }
}
