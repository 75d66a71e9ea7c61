//! Bounded, newest-first event histories.
//!
//! Two append-mostly logs back the relay: quiz answers received from
//! devices (cap 100) and questions broadcast to channels (cap 50). New
//! entries are prepended; once a log exceeds its cap the oldest entries
//! fall off. Every mutation writes through the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::store::{Collection, JsonStore};

/// Maximum retained quiz-answer events.
pub const ANSWER_CAP: usize = 100;

/// Maximum retained question records.
pub const QUESTION_CAP: usize = 50;

/// A quiz response received from a device. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub device_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

/// A question broadcast to a channel, kept for resend and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    /// Boolean-as-string, `"true"` / `"false"`.
    pub answer: String,
    pub date: String,
    pub channel: String,
    pub time: String,
    /// The exact outbound text, reused verbatim on resend.
    pub message: String,
}

/// Load a history collection, degrading to empty on a read failure.
async fn load_entries<T: serde::de::DeserializeOwned>(
    store: &JsonStore,
    collection: Collection,
) -> Vec<T> {
    match store.load::<Vec<T>>(collection).await {
        Ok(Some(entries)) => entries,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(collection = %collection, error = %e, "Failed to load history, starting empty");
            Vec::new()
        }
    }
}

/// Write-through log of received quiz answers.
pub struct AnswerHistory {
    store: JsonStore,
    entries: Mutex<Vec<AnswerEvent>>,
}

impl AnswerHistory {
    pub async fn load(store: JsonStore) -> Self {
        let entries = load_entries(&store, Collection::Answers).await;
        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    /// Prepend an answer, evicting beyond [`ANSWER_CAP`]. Returns the
    /// updated history, newest first.
    pub async fn push(&self, event: AnswerEvent) -> Result<Vec<AnswerEvent>> {
        let mut entries = self.entries.lock().await;
        entries.insert(0, event);
        entries.truncate(ANSWER_CAP);
        self.store.save(Collection::Answers, &*entries).await?;
        Ok(entries.clone())
    }

    /// Snapshot, newest first.
    pub async fn snapshot(&self) -> Vec<AnswerEvent> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Write-through log of broadcast questions.
pub struct QuestionHistory {
    store: JsonStore,
    entries: Mutex<Vec<QuestionRecord>>,
}

impl QuestionHistory {
    pub async fn load(store: JsonStore) -> Self {
        let entries = load_entries(&store, Collection::Questions).await;
        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    /// Prepend a question, evicting beyond [`QUESTION_CAP`]. Returns the
    /// updated history, newest first.
    pub async fn push(&self, record: QuestionRecord) -> Result<Vec<QuestionRecord>> {
        let mut entries = self.entries.lock().await;
        entries.insert(0, record);
        entries.truncate(QUESTION_CAP);
        self.store.save(Collection::Questions, &*entries).await?;
        Ok(entries.clone())
    }

    /// Question at `index`, if any. Resend reuses the stored record
    /// without creating a new one.
    pub async fn get(&self, index: usize) -> Option<QuestionRecord> {
        self.entries.lock().await.get(index).cloned()
    }

    /// Remove the question at `index`. Returns `false` when out of range.
    pub async fn delete(&self, index: usize) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if index >= entries.len() {
            return Ok(false);
        }
        entries.remove(index);
        self.store.save(Collection::Questions, &*entries).await?;
        Ok(true)
    }

    /// Snapshot, newest first.
    pub async fn snapshot(&self) -> Vec<QuestionRecord> {
        self.entries.lock().await.clone()
    }
}
