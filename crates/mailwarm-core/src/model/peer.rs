use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::InboxId;

/// A peer address an inbox exchanges warm-up mail with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Row identifier.
    pub id: i64,
    /// Owning inbox.
    pub inbox_id: InboxId,
    /// Peer email address.
    pub address: String,
    /// Relative selection weight; values below 1 count as 1.
    pub weight: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Peer {
    /// Weight as used for selection.
    #[must_use]
    pub fn effective_weight(&self) -> u64 {
        u64::try_from(self.weight.clamp(1, i64::from(u32::MAX))).unwrap_or(1)
    }
}
