//! Daily send plan.
//!
//! A plan is a sorted set of distinct minute-of-day slots inside the active
//! window `[09:00, 17:00)` UTC. A slot is due once the current minute of the
//! day has reached it.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::model::InboxId;

/// First minute of the active window (09:00).
pub const WINDOW_START: u32 = 540;
/// End of the active window, exclusive (17:00).
pub const WINDOW_END: u32 = 1020;
/// Distinct minutes in the window.
pub const WINDOW_WIDTH: usize = (WINDOW_END - WINDOW_START) as usize;

/// Draws `min(max(1, daily_target), 480)` distinct slots, ascending.
pub fn daily_plan<R: Rng + ?Sized>(daily_target: i64, rng: &mut R) -> Vec<u32> {
    let target = usize::try_from(daily_target.max(1)).unwrap_or(usize::MAX);
    let k = target.min(WINDOW_WIDTH);

    let mut slots: Vec<u32> = rand::seq::index::sample(rng, WINDOW_WIDTH, k)
        .into_iter()
        .filter_map(|offset| u32::try_from(offset).ok())
        .map(|offset| WINDOW_START + offset)
        .collect();
    slots.sort_unstable();
    slots
}

/// Number of slots at or before `minute`.
#[must_use]
pub fn due_count(plan: &[u32], minute: u32) -> usize {
    plan.partition_point(|&slot| slot <= minute)
}

/// Minutes since UTC midnight.
#[must_use]
pub fn minute_of_day(now: DateTime<Utc>) -> u32 {
    now.hour() * 60 + now.minute()
}

/// UTC midnight starting the day containing `now`.
#[must_use]
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Produces the plan for an inbox and day, stable for that pair.
///
/// The generator is seeded from `SHA-256(salt, inbox id, date)`, so every
/// tick of a day (and every process sharing the salt) sees the same slots,
/// while other inboxes and other days get independent draws.
#[derive(Debug, Clone, Default)]
pub struct PlanSchedule {
    salt: String,
}

impl PlanSchedule {
    /// Creates a schedule with a deployment salt.
    #[must_use]
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Plan for `inbox` on `date`.
    #[must_use]
    pub fn plan_for(&self, inbox: &InboxId, date: NaiveDate, daily_target: i64) -> Vec<u32> {
        let mut rng = StdRng::from_seed(self.seed(inbox, date));
        daily_plan(daily_target, &mut rng)
    }

    fn seed(&self, inbox: &InboxId, date: NaiveDate) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update([0]);
        hasher.update(inbox.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
        hasher.finalize().into()
    }
}
