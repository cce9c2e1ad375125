//! Per-session conversation memory.
//!
//! Each session keeps its most recent turns; the oldest turn is dropped once
//! the buffer is full. Sessions themselves are kept in an LRU cache so idle
//! conversations fall out of memory. An evicted session is rebuilt from chat
//! storage the next time it is used.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;

use counsel_core::ChatTurn;

/// Bounded, session-keyed buffer of [`ChatTurn`]s.
pub struct ConversationMemory {
    sessions: Mutex<LruCache<String, VecDeque<ChatTurn>>>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize, max_sessions: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            max_turns: max_turns.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, VecDeque<ChatTurn>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the session is currently held in memory.
    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains(session_id)
    }

    /// Turns of a session, oldest first. Unknown sessions have no history.
    pub fn history(&self, session_id: &str) -> Vec<ChatTurn> {
        self.lock()
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record a turn, evicting the oldest one when the session is full.
    pub fn append(&self, session_id: &str, turn: ChatTurn) {
        let mut sessions = self.lock();
        let turns = sessions.get_or_insert_mut(session_id.to_string(), VecDeque::new);
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// Replace a session's history with turns loaded from storage.
    pub fn seed(&self, session_id: &str, turns: Vec<ChatTurn>) {
        let skip = turns.len().saturating_sub(self.max_turns);
        let buffer: VecDeque<ChatTurn> = turns.into_iter().skip(skip).collect();
        self.lock().put(session_id.to_string(), buffer);
    }

    /// Forget a session. Returns whether it was held.
    pub fn clear(&self, session_id: &str) -> bool {
        self.lock().pop(session_id).is_some()
    }

    /// Number of sessions held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
