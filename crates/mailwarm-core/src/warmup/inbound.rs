//! Inbound engagement: open, star and reply to mail from peers.
//!
//! The pass never fails. Every sub-step result is folded into an
//! [`InboundReport`] so callers can log what happened without having to
//! handle errors.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use super::WarmupSettings;
use super::composer::compose;
use crate::model::{Inbox, ReadAction, ReadEvent};
use crate::transport::{InboundTransport, OutboundTransport, TransportError};

/// Sub-step of the inbound pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundStep {
    /// Listing unseen messages.
    Fetch,
    /// Setting `\Seen`.
    MarkSeen,
    /// Setting `\Flagged`.
    Flag,
    /// Sending a reply.
    Reply,
}

/// A swallowed sub-step failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboundFailure {
    /// Where it happened.
    pub step: InboundStep,
    /// Message concerned, if any.
    pub message_id: Option<String>,
    /// Error text.
    pub error: String,
}

/// What one inbound pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InboundReport {
    /// False when the inbox has no complete IMAP settings.
    pub polled: bool,
    /// Unseen messages found.
    pub unseen: usize,
    /// Unseen messages sent by a known peer.
    pub matched: usize,
    /// Messages marked seen.
    pub seen: usize,
    /// Messages starred.
    pub starred: usize,
    /// Replies sent.
    pub replied: usize,
    /// Swallowed failures.
    pub failures: Vec<InboundFailure>,
    /// Engagement events to record.
    #[serde(skip)]
    pub events: Vec<ReadEvent>,
}

impl InboundReport {
    fn fail(&mut self, step: InboundStep, message_id: Option<&str>, error: &TransportError) {
        self.failures.push(InboundFailure {
            step,
            message_id: message_id.map(str::to_string),
            error: error.to_string(),
        });
    }

    fn record(&mut self, inbox: &Inbox, message_id: &str, action: ReadAction, at: DateTime<Utc>) {
        self.events.push(ReadEvent {
            inbox_id: inbox.id.clone(),
            message_id: message_id.to_string(),
            action,
            at,
        });
    }
}

/// Polls `inbox` and engages with unseen mail from `peers`.
///
/// A message matches when its `From` contains any peer address,
/// case-insensitively. Matched messages are marked seen, then starred with
/// probability `star_rate` and answered with probability `reply_rate`.
/// Everything else is left unseen.
pub async fn poll_and_react<R: Rng + Send + ?Sized>(
    inbound: &dyn InboundTransport,
    outbound: &dyn OutboundTransport,
    inbox: &Inbox,
    peers: &[String],
    settings: &WarmupSettings,
    rng: &mut R,
    now: DateTime<Utc>,
) -> InboundReport {
    let mut report = InboundReport::default();
    if !inbox.imap.is_complete() {
        debug!(inbox = %inbox.id, "no IMAP settings, skipping inbound pass");
        return report;
    }
    report.polled = true;

    let messages = match inbound.fetch_unseen(inbox).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!(inbox = %inbox.id, error = %e, "inbound poll failed");
            report.fail(InboundStep::Fetch, None, &e);
            inbound.finish(inbox).await;
            return report;
        }
    };
    report.unseen = messages.len();

    let needles: Vec<String> = peers
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    for message in &messages {
        let from = message.from.to_lowercase();
        if !needles.iter().any(|needle| from.contains(needle.as_str())) {
            continue;
        }
        report.matched += 1;

        if let Err(e) = inbound.mark_seen(inbox, &message.id).await {
            report.fail(InboundStep::MarkSeen, Some(&message.id), &e);
            continue;
        }
        report.seen += 1;
        report.record(inbox, message.event_key(), ReadAction::Opened, now);

        if roll(rng, settings.star_rate) {
            match inbound.flag(inbox, &message.id).await {
                Ok(()) => {
                    report.starred += 1;
                    report.record(inbox, message.event_key(), ReadAction::Starred, now);
                }
                Err(e) => report.fail(InboundStep::Flag, Some(&message.id), &e),
            }
        }

        if roll(rng, settings.reply_rate) {
            let reply = compose(Some(&message.subject), rng);
            match outbound
                .send(inbox, &message.reply_to, &reply.subject, &reply.body)
                .await
            {
                Ok(_) => {
                    report.replied += 1;
                    report.record(inbox, message.event_key(), ReadAction::Replied, now);
                }
                Err(e) => report.fail(InboundStep::Reply, Some(&message.id), &e),
            }
        }
    }

    inbound.finish(inbox).await;

    if report.failures.is_empty() {
        debug!(
            inbox = %inbox.id,
            unseen = report.unseen,
            seen = report.seen,
            starred = report.starred,
            replied = report.replied,
            "inbound pass done"
        );
    } else {
        warn!(
            inbox = %inbox.id,
            failures = report.failures.len(),
            "inbound pass finished with errors"
        );
    }
    report
}

/// True with probability `rate`; rates outside `(0, 1]` never/always fire.
fn roll<R: Rng + ?Sized>(rng: &mut R, rate: f64) -> bool {
    rate > 0.0 && rng.r#gen::<f64>() < rate
}
