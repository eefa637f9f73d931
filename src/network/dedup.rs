//! Client-side suppression of chat messages delivered twice.
//!
//! The backend can echo the same chat message over several paths (REST reply
//! and live frame, or a reconnect replay). A message is a duplicate when a
//! previously accepted message has the same sender and content and a
//! timestamp less than the window apart.

use std::collections::VecDeque;

use super::messages::ChatMessage;
use crate::constants::{DEDUP_WINDOW_MS, HITL_DEDUP_WINDOW_MS};

#[derive(Debug, Clone)]
struct Seen {
    sender: String,
    content: String,
    timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct MessageDeduplicator {
    window_ms: i64,
    hitl_window_ms: i64,
    recent: VecDeque<Seen>,
}

impl Default for MessageDeduplicator {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW_MS, HITL_DEDUP_WINDOW_MS)
    }
}

impl MessageDeduplicator {
    pub fn new(window_ms: i64, hitl_window_ms: i64) -> Self {
        Self {
            window_ms,
            hitl_window_ms,
            recent: VecDeque::new(),
        }
    }

    fn window_for(&self, message: &ChatMessage) -> i64 {
        if message.hitl {
            self.hitl_window_ms
        } else {
            self.window_ms
        }
    }

    /// Returns `true` when the message should be shown, remembering it for
    /// later comparisons.
    pub fn accept(&mut self, message: &ChatMessage) -> bool {
        let window = self.window_for(message);
        let duplicate = self.recent.iter().any(|seen| {
            seen.sender == message.sender
                && seen.content == message.content
                && message.timestamp.abs_diff(seen.timestamp) < window.max(0) as u64
        });
        if duplicate {
            log::debug!("Suppressed duplicate chat message from {}", message.sender);
            return false;
        }

        self.recent.push_back(Seen {
            sender: message.sender.clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        });
        self.prune(message.timestamp);
        true
    }

    fn prune(&mut self, newest: i64) {
        let horizon = newest.saturating_sub(self.window_ms.max(self.hitl_window_ms));
        self.recent.retain(|seen| seen.timestamp > horizon);
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }
}
