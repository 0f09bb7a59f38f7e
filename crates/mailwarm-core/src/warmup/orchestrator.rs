//! The warm-up tick.
//!
//! Callers must not run two ticks at once: the catch-up count is computed
//! from a snapshot of the send log, so overlapping ticks would double-send.
//! The service binary serialises ticks behind a lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{Instrument, error, info, info_span, warn};

use super::executor::{SendOutcome, execute_send};
use super::inbound::{InboundReport, poll_and_react};
use super::plan::{PlanSchedule, due_count, minute_of_day, start_of_day};
use super::{WarmupSettings, compose, peers};
use crate::model::{Inbox, InboxId, NewSendLog};
use crate::storage::WarmupStore;
use crate::transport::{InboundTransport, OutboundTransport};
use crate::{Error, Result};

/// What happened to one inbox during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InboxOutcome {
    /// Inbox processed.
    pub inbox_id: Option<InboxId>,
    /// Inbox label.
    pub label: String,
    /// Planned slots at or before now.
    pub due: usize,
    /// Send attempts already logged today.
    pub already_sent: usize,
    /// Catch-up count for this tick.
    pub to_send: usize,
    /// Successful sends.
    pub sent: usize,
    /// Failed sends.
    pub failed: usize,
    /// Sends were cut short because the peer pool is empty.
    pub skipped_empty_pool: bool,
    /// Inbound pass result; absent when the inbox was aborted first.
    pub inbound: Option<InboundReport>,
    /// Error that aborted this inbox.
    pub error: Option<String>,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tick time.
    pub at: DateTime<Utc>,
    /// One entry per active inbox, in listing order.
    pub inboxes: Vec<InboxOutcome>,
}

impl TickReport {
    /// Successful sends across all inboxes.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.inboxes.iter().map(|o| o.sent).sum()
    }

    /// Failed sends across all inboxes.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.inboxes.iter().map(|o| o.failed).sum()
    }

    /// Inboxes aborted by an error.
    #[must_use]
    pub fn aborted(&self) -> usize {
        self.inboxes.iter().filter(|o| o.error.is_some()).count()
    }
}

/// Runs warm-up ticks over every active inbox.
pub struct Orchestrator {
    store: Arc<dyn WarmupStore>,
    outbound: Arc<dyn OutboundTransport>,
    inbound: Arc<dyn InboundTransport>,
    plans: PlanSchedule,
    settings: WarmupSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plans", &self.plans)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        store: Arc<dyn WarmupStore>,
        outbound: Arc<dyn OutboundTransport>,
        inbound: Arc<dyn InboundTransport>,
        settings: WarmupSettings,
    ) -> Self {
        let settings = settings.normalized();
        Self {
            store,
            outbound,
            inbound,
            plans: PlanSchedule::new(settings.plan_salt.clone()),
            settings,
        }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &WarmupSettings {
        &self.settings
    }

    /// Runs one tick at `now`.
    ///
    /// Each inbox is isolated: its failures are recorded in its
    /// [`InboxOutcome`] and never affect the others.
    ///
    /// # Errors
    ///
    /// Returns an error only when the active inboxes cannot be listed.
    pub async fn run_once<R: Rng + Send + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<TickReport> {
        let inboxes = self.store.list_active_inboxes().await?;

        let jobs: Vec<_> = inboxes
            .into_iter()
            .map(|inbox| {
                let rng = StdRng::seed_from_u64(rng.r#gen());
                let span = info_span!("inbox", id = %inbox.id, label = %inbox.label);
                self.run_inbox(inbox, now, rng).instrument(span)
            })
            .collect();

        let outcomes: Vec<InboxOutcome> = stream::iter(jobs)
            .buffered(self.settings.concurrency)
            .collect()
            .await;

        let report = TickReport {
            at: now,
            inboxes: outcomes,
        };
        info!(
            inboxes = report.inboxes.len(),
            sent = report.sent(),
            failed = report.failed(),
            aborted = report.aborted(),
            "tick complete"
        );
        Ok(report)
    }

    async fn run_inbox(&self, inbox: Inbox, now: DateTime<Utc>, mut rng: StdRng) -> InboxOutcome {
        let mut outcome = InboxOutcome {
            inbox_id: Some(inbox.id.clone()),
            label: inbox.label.clone(),
            ..InboxOutcome::default()
        };

        if let Err(e) = self.process(&inbox, now, &mut rng, &mut outcome).await {
            error!(error = %e, "inbox aborted for this tick");
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn process(
        &self,
        inbox: &Inbox,
        now: DateTime<Utc>,
        rng: &mut StdRng,
        outcome: &mut InboxOutcome,
    ) -> Result<()> {
        let plan = self
            .plans
            .plan_for(&inbox.id, now.date_naive(), inbox.daily_target);
        outcome.due = due_count(&plan, minute_of_day(now));
        outcome.already_sent = self
            .store
            .count_sends_since(&inbox.id, start_of_day(now))
            .await?;
        outcome.to_send = outcome.due.saturating_sub(outcome.already_sent);

        let pool = self.store.list_peers(&inbox.id).await?;

        for _ in 0..outcome.to_send {
            let peer = match peers::choose(&pool, rng) {
                Ok(peer) => peer,
                Err(Error::EmptyPool) => {
                    warn!(pending = outcome.to_send - outcome.sent - outcome.failed, "peer pool is empty");
                    outcome.skipped_empty_pool = true;
                    break;
                }
                Err(e) => return Err(e),
            };
            let message = compose(None, rng);
            let result = execute_send(
                self.outbound.as_ref(),
                inbox,
                &peer.address,
                &message.subject,
                &message.body,
                self.settings.max_error_len,
            )
            .await;

            let (provider_message_id, error) = match result {
                SendOutcome::Delivered { message_id } => {
                    outcome.sent += 1;
                    (Some(message_id), None)
                }
                SendOutcome::Failed { error } => {
                    outcome.failed += 1;
                    (None, Some(error))
                }
            };
            self.store
                .append_send_log(NewSendLog {
                    inbox_id: inbox.id.clone(),
                    to: peer.address.clone(),
                    subject: message.subject,
                    body: message.body,
                    success: provider_message_id.is_some(),
                    provider_message_id,
                    error,
                    sent_at: now,
                })
                .await?;
        }

        let addresses: Vec<String> = pool.iter().map(|p| p.address.clone()).collect();
        let report = poll_and_react(
            self.inbound.as_ref(),
            self.outbound.as_ref(),
            inbox,
            &addresses,
            &self.settings,
            rng,
            now,
        )
        .await;

        for event in &report.events {
            if let Err(e) = self.store.append_read_event(event).await {
                warn!(error = %e, action = event.action.as_str(), "could not record read event");
            }
        }
        outcome.inbound = Some(report);
        Ok(())
    }
}
