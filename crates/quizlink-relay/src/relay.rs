//! Relay fan-out engine.
//!
//! Accepts one validated inbound device message, persists it when it is a
//! quiz answer, then attempts delivery to every configured destination
//! independently. Delivery is at-most-once and best-effort: a failed
//! destination is logged and skipped, never retried, and never aborts the
//! remaining destinations. Answer persistence happens before and
//! regardless of dispatch, so an answer is never lost to a downstream
//! outage.

use chrono::Utc;
use tracing::{info, warn};

use quizlink_core::history::AnswerEvent;

use crate::state::AppState;

/// Message type devices use for quiz responses.
pub const QUIZ_ANSWER_KIND: &str = "quiz_answer";

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub chat_id: String,
    pub delivered: bool,
}

/// Aggregate result of one relay call. The wire response only carries
/// `sent`; per-destination outcomes stay server-side.
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub sent: u64,
    pub outcomes: Vec<DispatchOutcome>,
}

/// Relay one inbound message. The caller has already validated the
/// message and the shared secret.
pub async fn relay_message(
    state: &AppState,
    device_id: &str,
    message: &str,
    kind: &str,
) -> RelayReport {
    state.stats.record_received();

    if kind == QUIZ_ANSWER_KIND {
        let event = AnswerEvent {
            device_id: device_id.to_string(),
            message: message.to_string(),
            kind: kind.to_string(),
            timestamp: Utc::now(),
        };
        // Persisting the answer must not block dispatch; a storage outage
        // here is logged and the fan-out proceeds.
        match state.answers.push(event).await {
            Ok(_) => info!(device_id, "Answer saved"),
            Err(e) => warn!(device_id, error = %e, "Failed to persist answer"),
        }
    }

    let mut outcomes = Vec::new();
    if kind != QUIZ_ANSWER_KIND || state.settings.forward_answers {
        for bot in &state.settings.bots {
            for chat_id in &bot.chats {
                let delivered = match state
                    .sender
                    .send_message(&bot.token, chat_id, message)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(chat_id = %chat_id, error = %e, "Outbound delivery failed");
                        false
                    }
                };
                outcomes.push(DispatchOutcome {
                    chat_id: chat_id.clone(),
                    delivered,
                });
            }
        }
    }

    let sent = outcomes.iter().filter(|o| o.delivered).count() as u64;
    state.stats.record_sent(sent);

    RelayReport { sent, outcomes }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use quizlink_core::config::parse_bots;
    use quizlink_core::store::JsonStore;

    use crate::state::RelaySettings;
    use crate::telegram::{MessageSender, SendError};

    /// Records every send; optionally fails a specific chat.
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail_chat: Option<String>,
    }

    impl RecordingSender {
        fn new(fail_chat: Option<&str>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_chat: fail_chat.map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_message(
            &self,
            _token: &str,
            chat_id: &str,
            text: &str,
        ) -> Result<(), SendError> {
            if self.fail_chat.as_deref() == Some(chat_id) {
                return Err(SendError::Request("connection refused".to_string()));
            }
            self.sent
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    /// Sender that flags any invocation, for must-not-dispatch tests.
    #[derive(Default)]
    struct TrippedSender {
        tripped: AtomicBool,
    }

    #[async_trait]
    impl MessageSender for TrippedSender {
        async fn send_message(
            &self,
            _token: &str,
            _chat_id: &str,
            _text: &str,
        ) -> Result<(), SendError> {
            self.tripped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn state_with(
        sender: Arc<dyn MessageSender>,
        forward_answers: bool,
    ) -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        let settings = RelaySettings {
            secret: "s3cret".to_string(),
            bots: parse_bots("123:TOKEN:-1001,-1002"),
            forward_answers,
        };
        let state = AppState::initialize(store, settings, sender).await;
        (dir, state)
    }

    #[tokio::test]
    async fn status_message_fans_out_to_every_chat() {
        let sender = Arc::new(RecordingSender::new(None));
        let (_dir, state) = state_with(Arc::clone(&sender) as Arc<dyn MessageSender>, false).await;

        let report = relay_message(&state, "dev-1", "boot ok", "status").await;
        assert_eq!(report.sent, 2);
        assert_eq!(state.stats.received(), 1);
        assert_eq!(state.stats.sent(), 2);

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, text)| text == "boot ok"));
    }

    #[tokio::test]
    async fn failed_destination_does_not_abort_the_rest() {
        let sender = Arc::new(RecordingSender::new(Some("-1001")));
        let (_dir, state) = state_with(Arc::clone(&sender) as Arc<dyn MessageSender>, false).await;

        let report = relay_message(&state, "dev-1", "hello", "status").await;
        assert_eq!(report.sent, 1);
        assert_eq!(
            report.outcomes,
            vec![
                DispatchOutcome { chat_id: "-1001".to_string(), delivered: false },
                DispatchOutcome { chat_id: "-1002".to_string(), delivered: true },
            ]
        );
        assert_eq!(state.stats.sent(), 1);
    }

    #[tokio::test]
    async fn quiz_answer_is_persisted_without_dispatch_by_default() {
        let sender = Arc::new(TrippedSender::default());
        let (_dir, state) = state_with(Arc::clone(&sender) as Arc<dyn MessageSender>, false).await;

        let report = relay_message(&state, "dev-1", "ANSWER:TRUE", QUIZ_ANSWER_KIND).await;
        assert_eq!(report.sent, 0);
        assert!(!sender.tripped.load(Ordering::SeqCst));

        let answers = state.answers.snapshot().await;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].device_id, "dev-1");
        assert_eq!(answers[0].kind, QUIZ_ANSWER_KIND);
    }

    #[tokio::test]
    async fn quiz_answer_is_also_forwarded_when_enabled() {
        let sender = Arc::new(RecordingSender::new(None));
        let (_dir, state) = state_with(Arc::clone(&sender) as Arc<dyn MessageSender>, true).await;

        let report = relay_message(&state, "dev-1", "ANSWER:TRUE", QUIZ_ANSWER_KIND).await;
        assert_eq!(report.sent, 2);
        assert_eq!(state.answers.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn no_destinations_means_zero_sent() {
        let sender = Arc::new(RecordingSender::new(None));
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        let settings = RelaySettings {
            secret: "s3cret".to_string(),
            bots: Vec::new(),
            forward_answers: false,
        };
        let state = AppState::initialize(store, settings, sender).await;

        let report = relay_message(&state, "dev-1", "hello", "status").await;
        assert_eq!(report.sent, 0);
        assert_eq!(state.stats.received(), 1);
    }
}
