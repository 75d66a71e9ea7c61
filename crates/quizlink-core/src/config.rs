//! Relay target configuration parsing.
//!
//! Outbound destinations are configured as a single string of the form
//! `token:chat1,chat2,...`. Bot tokens themselves contain a colon
//! (`123456:ABC-DEF...`), so the split happens at the LAST `:`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One bot credential plus the destination chats it serves.
///
/// Configured at process start and immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayTarget {
    pub token: String,
    pub chats: Vec<String>,
}

impl RelayTarget {
    /// Whether this bot serves the given chat.
    pub fn serves(&self, chat_id: &str) -> bool {
        self.chats.iter().any(|c| c == chat_id)
    }
}

/// Parse the `token:chat1,chat2` bot specification.
///
/// An empty or malformed spec yields no targets (the relay then fans out
/// to zero destinations); it is logged, not an error.
pub fn parse_bots(raw: &str) -> Vec<RelayTarget> {
    if raw.is_empty() {
        return Vec::new();
    }

    let Some(last_colon) = raw.rfind(':') else {
        warn!(spec = %raw, "Bot spec has no ':' separator, ignoring");
        return Vec::new();
    };

    let token = raw[..last_colon].to_string();
    let chats: Vec<String> = raw[last_colon + 1..]
        .split(',')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    info!(chats = chats.len(), "Parsed bot target");
    vec![RelayTarget { token, chats }]
}
