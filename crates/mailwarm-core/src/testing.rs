//! In-memory fakes for the storage and transport interfaces.
//!
//! Available to this crate's tests and, through the `testing` feature, to
//! dependent crates.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    ImapConfig, Inbox, InboxId, NewInbox, NewSendLog, Peer, ReadEvent, Security, SmtpConfig,
};
use crate::storage::WarmupStore;
use crate::transport::{
    InboundMessage, InboundTransport, OutboundTransport, TransportError, TransportErrorKind,
};
use crate::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn smtp_settings() -> SmtpConfig {
    SmtpConfig {
        host: "smtp.example.com".to_string(),
        port: 587,
        security: Security::StartTls,
        username: "warm@example.com".to_string(),
        password: "secret".to_string(),
    }
}

fn imap_settings() -> ImapConfig {
    ImapConfig {
        host: "imap.example.com".to_string(),
        port: 993,
        security: Security::Tls,
        username: "warm@example.com".to_string(),
        password: "secret".to_string(),
    }
}

/// An active inbox with complete SMTP and IMAP settings and a target of 20.
#[must_use]
pub fn inbox(label: &str) -> Inbox {
    Inbox {
        id: InboxId::generate(),
        label: label.to_string(),
        provider: "smtp".to_string(),
        daily_target: 20,
        active: true,
        smtp: smtp_settings(),
        imap: imap_settings(),
        created_at: Utc::now(),
    }
}

/// Creation input matching [`inbox`].
#[must_use]
pub fn new_inbox(label: &str) -> NewInbox {
    NewInbox {
        smtp: smtp_settings(),
        imap: imap_settings(),
        ..NewInbox::new(label)
    }
}

/// A peer row not tied to any stored inbox.
#[must_use]
pub fn peer(address: &str, weight: i64) -> Peer {
    Peer {
        id: 0,
        inbox_id: InboxId::from("inbox"),
        address: address.to_string(),
        weight,
        created_at: Utc::now(),
    }
}

/// An unseen message from `from`, replying to the same address.
#[must_use]
pub fn unseen(id: &str, from: &str) -> InboundMessage {
    InboundMessage {
        id: id.to_string(),
        from: from.to_string(),
        subject: "Quick check-in".to_string(),
        reply_to: from.to_string(),
        message_id: None,
    }
}

fn injected(what: &str) -> Error {
    Error::Storage(sqlx::Error::Protocol(format!("injected {what} failure")))
}

#[derive(Debug, Default)]
struct MemoryState {
    inboxes: Vec<Inbox>,
    peers: Vec<Peer>,
    sends: Vec<NewSendLog>,
    events: Vec<ReadEvent>,
    fail_listing: bool,
    fail_appends: bool,
    fail_counts: HashSet<InboxId>,
    send_log_budget: HashMap<InboxId, usize>,
}

/// [`WarmupStore`] kept in memory, with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an inbox.
    pub fn add_inbox(&self, inbox: Inbox) {
        lock(&self.state).inboxes.push(inbox);
    }

    /// Adds a peer to an inbox's pool.
    pub fn add_peer(&self, inbox: &InboxId, address: &str, weight: i64) {
        let mut state = lock(&self.state);
        let id = i64::try_from(state.peers.len()).unwrap_or(i64::MAX) + 1;
        state.peers.push(Peer {
            id,
            inbox_id: inbox.clone(),
            ..peer(address, weight)
        });
    }

    /// Send attempts recorded so far.
    #[must_use]
    pub fn sends(&self) -> Vec<NewSendLog> {
        lock(&self.state).sends.clone()
    }

    /// Read events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ReadEvent> {
        lock(&self.state).events.clone()
    }

    /// Makes `list_active_inboxes` fail.
    pub fn fail_listing(&self) {
        lock(&self.state).fail_listing = true;
    }

    /// Makes `count_sends_since` fail for one inbox.
    pub fn fail_counts_for(&self, inbox: &InboxId) {
        lock(&self.state).fail_counts.insert(inbox.clone());
    }

    /// Lets `inbox` record `accepted` more send attempts, then fails its
    /// `append_send_log` calls.
    pub fn fail_send_logs_after(&self, inbox: &InboxId, accepted: usize) {
        lock(&self.state)
            .send_log_budget
            .insert(inbox.clone(), accepted);
    }

    /// Makes both append operations fail.
    pub fn fail_appends(&self) {
        lock(&self.state).fail_appends = true;
    }
}

#[async_trait]
impl WarmupStore for MemoryStore {
    async fn list_active_inboxes(&self) -> Result<Vec<Inbox>> {
        let state = lock(&self.state);
        if state.fail_listing {
            return Err(injected("listing"));
        }
        Ok(state.inboxes.iter().filter(|i| i.active).cloned().collect())
    }

    async fn list_peers(&self, inbox: &InboxId) -> Result<Vec<Peer>> {
        let state = lock(&self.state);
        Ok(state
            .peers
            .iter()
            .filter(|p| p.inbox_id == *inbox)
            .cloned()
            .collect())
    }

    async fn count_sends_since(&self, inbox: &InboxId, since: DateTime<Utc>) -> Result<usize> {
        let state = lock(&self.state);
        if state.fail_counts.contains(inbox) {
            return Err(injected("count"));
        }
        Ok(state
            .sends
            .iter()
            .filter(|s| s.inbox_id == *inbox && s.sent_at >= since)
            .count())
    }

    async fn append_send_log(&self, entry: NewSendLog) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_appends {
            return Err(injected("append"));
        }
        if let Some(budget) = state.send_log_budget.get_mut(&entry.inbox_id) {
            if *budget == 0 {
                return Err(injected("append"));
            }
            *budget -= 1;
        }
        state.sends.push(entry);
        Ok(())
    }

    async fn append_read_event(&self, event: &ReadEvent) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_appends {
            return Err(injected("append"));
        }
        state.events.push(event.clone());
        Ok(())
    }
}

/// A message handed to [`RecordingOutbound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Sending inbox.
    pub inbox_id: InboxId,
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// [`OutboundTransport`] that records every call.
#[derive(Debug, Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<String>,
}

impl RecordingOutbound {
    /// Accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every message with `detail`.
    #[must_use]
    pub fn failing_with(detail: &str) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(detail.to_string()),
        }
    }

    /// Every attempted message, accepted or not.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl OutboundTransport for RecordingOutbound {
    async fn send(
        &self,
        inbox: &Inbox,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<String, TransportError> {
        let mut sent = lock(&self.sent);
        sent.push(SentMessage {
            inbox_id: inbox.id.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        match &self.failure {
            Some(detail) => Err(TransportError::new(TransportErrorKind::Rejected, detail)),
            None => Ok(format!("<{}@test>", sent.len())),
        }
    }
}

#[derive(Debug, Default)]
struct InboundState {
    unseen: HashMap<InboxId, Vec<InboundMessage>>,
    seen: Vec<String>,
    flagged: Vec<String>,
}

/// [`InboundTransport`] serving canned unseen lists.
#[derive(Debug, Default)]
pub struct ScriptedInbound {
    state: Mutex<InboundState>,
    failing_fetch: bool,
    failing_mark_seen: HashSet<String>,
    failing_flag: bool,
    fetch_calls: AtomicUsize,
    finish_calls: AtomicUsize,
}

impl ScriptedInbound {
    /// No unseen mail anywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `messages` as the unseen list of `inbox`.
    #[must_use]
    pub fn with_unseen(self, inbox: &InboxId, messages: Vec<InboundMessage>) -> Self {
        lock(&self.state).unseen.insert(inbox.clone(), messages);
        self
    }

    /// Fails every fetch.
    #[must_use]
    pub fn failing_fetch(mut self) -> Self {
        self.failing_fetch = true;
        self
    }

    /// Fails marking message `id` seen.
    #[must_use]
    pub fn failing_mark_seen(mut self, id: &str) -> Self {
        self.failing_mark_seen.insert(id.to_string());
        self
    }

    /// Fails every flag operation.
    #[must_use]
    pub fn failing_flag(mut self) -> Self {
        self.failing_flag = true;
        self
    }

    /// Number of fetches attempted.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `finish` calls.
    #[must_use]
    pub fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }

    /// Ids marked seen, in order.
    #[must_use]
    pub fn seen(&self) -> Vec<String> {
        lock(&self.state).seen.clone()
    }

    /// Ids flagged, in order.
    #[must_use]
    pub fn flagged(&self) -> Vec<String> {
        lock(&self.state).flagged.clone()
    }
}

fn refused(detail: &str) -> TransportError {
    TransportError::new(TransportErrorKind::Rejected, detail)
}

#[async_trait]
impl InboundTransport for ScriptedInbound {
    async fn fetch_unseen(
        &self,
        inbox: &Inbox,
    ) -> std::result::Result<Vec<InboundMessage>, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_fetch {
            return Err(TransportError::new(
                TransportErrorKind::Connect,
                "connection refused",
            ));
        }
        let state = lock(&self.state);
        let mut messages = state.unseen.get(&inbox.id).cloned().unwrap_or_default();
        messages.retain(|m| !state.seen.contains(&m.id));
        Ok(messages)
    }

    async fn mark_seen(&self, _inbox: &Inbox, id: &str) -> std::result::Result<(), TransportError> {
        if self.failing_mark_seen.contains(id) {
            return Err(refused("STORE failed"));
        }
        lock(&self.state).seen.push(id.to_string());
        Ok(())
    }

    async fn flag(&self, _inbox: &Inbox, id: &str) -> std::result::Result<(), TransportError> {
        if self.failing_flag {
            return Err(refused("STORE failed"));
        }
        lock(&self.state).flagged.push(id.to_string());
        Ok(())
    }

    async fn finish(&self, _inbox: &Inbox) {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
    }
}
