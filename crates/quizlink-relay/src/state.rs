//! Shared application state.
//!
//! One explicit struct, built at startup and injected into every handler,
//! replaces ad-hoc process globals. The registries inside are
//! write-through caches over the document store; the counters are plain
//! atomics read back by `/stats`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use quizlink_core::catalog::FirmwareCatalog;
use quizlink_core::config::RelayTarget;
use quizlink_core::history::{AnswerHistory, QuestionHistory};
use quizlink_core::negotiator::UpdateNegotiator;
use quizlink_core::registry::VersionRegistry;
use quizlink_core::store::JsonStore;

use crate::telegram::MessageSender;

/// Process-wide relay counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    sent: AtomicU64,
}

impl RelayStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, count: u64) {
        self.sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

/// Relay behavior fixed at process start.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Shared secret devices must present on `/relay`.
    pub secret: String,
    /// Outbound destinations.
    pub bots: Vec<RelayTarget>,
    /// Also duplicate quiz answers to the outbound destinations.
    pub forward_answers: bool,
}

/// Everything a handler needs, shared behind one `Arc`.
pub struct AppState {
    pub registry: Arc<VersionRegistry>,
    pub catalog: Arc<FirmwareCatalog>,
    pub negotiator: UpdateNegotiator,
    pub answers: AnswerHistory,
    pub questions: QuestionHistory,
    pub settings: RelaySettings,
    pub stats: RelayStats,
    pub sender: Arc<dyn MessageSender>,
}

impl AppState {
    /// Load every persisted collection and assemble the shared state.
    pub async fn initialize(
        store: JsonStore,
        settings: RelaySettings,
        sender: Arc<dyn MessageSender>,
    ) -> Arc<Self> {
        let registry = Arc::new(VersionRegistry::load(store.clone()).await);
        let catalog = Arc::new(FirmwareCatalog::load(store.clone()).await);
        let negotiator = UpdateNegotiator::new(Arc::clone(&registry), Arc::clone(&catalog));
        let answers = AnswerHistory::load(store.clone()).await;
        let questions = QuestionHistory::load(store).await;

        Arc::new(Self {
            registry,
            catalog,
            negotiator,
            answers,
            questions,
            settings,
            stats: RelayStats::default(),
            sender,
        })
    }

    /// Total configured outbound destinations across all bots.
    pub fn destination_count(&self) -> usize {
        self.settings.bots.iter().map(|b| b.chats.len()).sum()
    }

    /// The bot serving `chat_id`, if any is configured for it.
    pub fn bot_for_channel(&self, chat_id: &str) -> Option<&RelayTarget> {
        self.settings.bots.iter().find(|b| b.serves(chat_id))
    }
}
