//! One send attempt and its classification.

use tracing::{debug, warn};

use crate::model::Inbox;
use crate::transport::OutboundTransport;

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the server.
    Delivered {
        /// Message-ID of the sent message.
        message_id: String,
    },
    /// Not delivered.
    Failed {
        /// Truncated error text.
        error: String,
    },
}

impl SendOutcome {
    /// True for [`SendOutcome::Delivered`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Attempts one delivery. Transport failures are captured in the outcome,
/// never returned, and never retried.
pub async fn execute_send(
    transport: &dyn OutboundTransport,
    inbox: &Inbox,
    to: &str,
    subject: &str,
    body: &str,
    max_error_len: usize,
) -> SendOutcome {
    match transport.send(inbox, to, subject, body).await {
        Ok(message_id) => {
            debug!(inbox = %inbox.id, to, %message_id, "warm-up message sent");
            SendOutcome::Delivered { message_id }
        }
        Err(e) => {
            warn!(inbox = %inbox.id, to, error = %e, "warm-up send failed");
            SendOutcome::Failed {
                error: truncate_error(&e.to_string(), max_error_len),
            }
        }
    }
}

/// Keeps at most `max_chars` characters.
#[must_use]
pub fn truncate_error(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingOutbound, inbox};

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_error("short", 500), "short");
        assert_eq!(truncate_error("ééééé", 3), "ééé");
        assert_eq!(truncate_error(&"x".repeat(600), 500).len(), 500);
    }

    #[tokio::test]
    async fn success_carries_the_message_id() {
        let outbound = RecordingOutbound::new();
        let inbox = inbox("warm");
        let outcome = execute_send(&outbound, &inbox, "peer@x.com", "Ping", "hi", 500).await;
        assert!(outcome.is_success());
        assert_eq!(outbound.sent().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_captured_and_truncated() {
        let outbound = RecordingOutbound::failing_with(&"refused ".repeat(100));
        let inbox = inbox("warm");
        let outcome = execute_send(&outbound, &inbox, "peer@x.com", "Ping", "hi", 40).await;
        match outcome {
            SendOutcome::Failed { error } => assert_eq!(error.chars().count(), 40),
            SendOutcome::Delivered { .. } => panic!("expected failure"),
        }
    }
}
