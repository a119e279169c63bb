//! Temporal stability of successive analyses.
//!
//! A [StabilityTracker] belongs to one tuning session and is passed into every
//! analysis of that session. [SessionStore] keeps one tracker per opaque
//! session key for callers that serve several sessions at once.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::utils::stats::coefficient_of_variation;

/// Entries kept in the recency window.
pub const HISTORY_CAPACITY: usize = 20;
/// Most recent non-zero entries used for scoring.
const SCORED_ENTRIES: usize = 10;
const MIN_SCORED_ENTRIES: usize = 3;
/// Score reported while there is too little history.
pub const NEUTRAL_STABILITY: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct StabilityTracker {
    history: VecDeque<f64>,
}

impl StabilityTracker {
    pub fn new() -> Self {
        StabilityTracker {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append a final frequency, evicting the oldest entry when full. Zero
    /// (no detection) is recorded too but never scored.
    pub fn record(&mut self, frequency_hz: f64) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(frequency_hz);
    }

    /// `1 - min(1, 10 * cv)` over the last ten non-zero entries.
    pub fn stability(&self) -> f64 {
        let recent: Vec<f64> = self
            .history
            .iter()
            .rev()
            .filter(|&&f| f > 0.0)
            .take(SCORED_ENTRIES)
            .cloned()
            .collect();
        if recent.len() < MIN_SCORED_ENTRIES {
            return NEUTRAL_STABILITY;
        }
        match coefficient_of_variation(&recent) {
            Some(cv) => 1.0 - (10.0 * cv).min(1.0),
            None => NEUTRAL_STABILITY,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn history(&self) -> impl Iterator<Item = &f64> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Stability trackers keyed by an opaque session identifier.
///
/// Each session is locked individually, so analyses of one session are
/// serialized while different sessions proceed in parallel.
pub struct SessionStore<K> {
    sessions: Mutex<HashMap<K, Arc<Mutex<StabilityTracker>>>>,
}

impl<K: Hash + Eq + Clone> SessionStore<K> {
    pub fn new() -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The tracker of `key`, created on first use.
    pub fn tracker(&self, key: &K) -> Arc<Mutex<StabilityTracker>> {
        let mut sessions = self.sessions.lock();
        Arc::clone(sessions.entry(key.clone()).or_insert_with(Default::default))
    }

    /// Run `f` with exclusive access to the tracker of `key`. The store lock
    /// is released before `f` runs.
    pub fn with_tracker<R>(&self, key: &K, f: impl FnOnce(&mut StabilityTracker) -> R) -> R {
        let tracker = self.tracker(key);
        let mut guard = tracker.lock();
        f(&mut guard)
    }

    /// Current stability of `key`; neutral for unknown sessions.
    pub fn stability(&self, key: &K) -> f64 {
        let tracker = self.sessions.lock().get(key).cloned();
        tracker.map_or(NEUTRAL_STABILITY, |t| t.lock().stability())
    }

    /// Clear the history of `key` but keep the session.
    pub fn reset(&self, key: &K) {
        if let Some(tracker) = self.sessions.lock().get(key).cloned() {
            tracker.lock().reset();
        }
    }

    /// Drop the session of `key`.
    pub fn end(&self, key: &K) -> bool {
        self.sessions.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl<K: Hash + Eq + Clone> Default for SessionStore<K> {
    fn default() -> Self {
        SessionStore::new()
    }
}
