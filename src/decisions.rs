//! # Stage: Decision Store
//!
//! ## Responsibility
//! Track which names the user has decided on (`decided`) and which of those
//! they liked (`kept`), and apply like / discard / remove / reset with the
//! settle-delay cooldown in front of like and discard.
//!
//! ## Guarantees
//! - `kept ⊆ decided` after every operation, in any order
//! - `kept` keeps insertion order and never holds a key twice
//! - While a like/discard is settling, further like/discard calls are ignored;
//!   remove and reset are never ignored
//! - A remove of the pending key, or a reset, cancels the pending transition,
//!   so the later user action wins
//! - Mutations are serialized by a mutex; persistence requests are enqueued
//!   under the same lock so storage sees them in mutation order
//!
//! ## NOT Responsible For
//! - Choosing which key to act on (see [`crate::selection`])
//! - Waiting for storage (writes go through [`Persister`])

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::storage::{Persister, KEY_LIKED, KEY_SEEN};

/// Default settle delay, matching the card exit animation.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(400);

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// The two swipe outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Like,
    Discard,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Like => write!(f, "like"),
            Verdict::Discard => write!(f, "discard"),
        }
    }
}

/// Which persisted sets a mutation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dirty {
    pub kept: bool,
    pub decided: bool,
}

impl Dirty {
    const NONE: Dirty = Dirty { kept: false, decided: false };
    const BOTH: Dirty = Dirty { kept: true, decided: true };
    const DECIDED: Dirty = Dirty { kept: false, decided: true };
}

#[derive(Debug, Clone)]
struct PendingTransition {
    id: u64,
    verdict: Verdict,
    key: String,
    cancelled: bool,
    due: Instant,
}

// ---------------------------------------------------------------------------
// DecisionState: the synchronous state machine
// ---------------------------------------------------------------------------

/// Kept and decided sets plus the `TransitionPending` flag.
#[derive(Debug, Clone, Default)]
pub struct DecisionState {
    kept: Vec<String>,
    decided: HashSet<String>,
    pending: Option<PendingTransition>,
    next_id: u64,
}

impl DecisionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted sets.  Duplicate kept entries are collapsed and
    /// any kept key missing from `decided` is added to it.
    pub fn from_parts(kept: Vec<String>, decided: HashSet<String>) -> Self {
        let mut state = Self { decided, ..Self::default() };
        for key in kept {
            state.insert_kept(key);
        }
        state
    }

    pub fn kept(&self) -> &[String] {
        &self.kept
    }

    pub fn decided(&self) -> &HashSet<String> {
        &self.decided
    }

    pub fn is_kept(&self, key: &str) -> bool {
        self.kept.iter().any(|k| k == key)
    }

    pub fn is_decided(&self, key: &str) -> bool {
        self.decided.contains(key)
    }

    /// True while a like/discard is waiting to settle.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Key and verdict of the transition waiting to settle, if any.
    pub fn pending(&self) -> Option<(&str, Verdict)> {
        self.pending.as_ref().map(|p| (p.key.as_str(), p.verdict))
    }

    /// Decided keys sorted, for stable serialization.
    pub fn decided_sorted(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.decided.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Raise the pending flag for `verdict` on `key`.
    ///
    /// Returns the transition id, or `None` when another transition is
    /// already pending and this call must be ignored.  `due` is when the
    /// transition should settle; see [`DecisionState::expire`].
    pub fn begin(&mut self, verdict: Verdict, key: &str, due: Instant) -> Option<u64> {
        if self.pending.is_some() {
            return None;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.pending = Some(PendingTransition {
            id,
            verdict,
            key: key.to_string(),
            cancelled: false,
            due,
        });
        Some(id)
    }

    /// Settle a pending transition whose deadline is at or before `now`.
    /// A settle timer that never fires must not hold the cooldown forever.
    pub fn expire(&mut self, now: Instant) -> Dirty {
        let overdue = self.pending.as_ref().filter(|p| p.due <= now).map(|p| p.id);
        match overdue {
            Some(id) => self.settle(id),
            None => Dirty::NONE,
        }
    }

    /// Complete transition `id`: apply it unless it was cancelled, then
    /// clear the pending flag.  A stale id is a no-op.
    pub fn settle(&mut self, id: u64) -> Dirty {
        match self.pending.take() {
            Some(p) if p.id == id => {
                if p.cancelled {
                    Dirty::NONE
                } else {
                    self.apply(p.verdict, &p.key)
                }
            }
            other => {
                self.pending = other;
                Dirty::NONE
            }
        }
    }

    /// Apply a verdict directly, bypassing the cooldown.
    pub fn apply(&mut self, verdict: Verdict, key: &str) -> Dirty {
        match verdict {
            Verdict::Like => {
                self.insert_kept(key.to_string());
                Dirty::BOTH
            }
            Verdict::Discard => {
                self.decided.insert(key.to_string());
                Dirty::DECIDED
            }
        }
    }

    /// Drop `key` from both sets so it becomes a candidate again.
    pub fn remove(&mut self, key: &str) -> Dirty {
        self.kept.retain(|k| k != key);
        self.decided.remove(key);
        if let Some(p) = self.pending.as_mut() {
            if p.key == key {
                p.cancelled = true;
            }
        }
        Dirty::BOTH
    }

    /// Clear both sets at once and cancel any pending transition.
    pub fn reset(&mut self) -> Dirty {
        self.kept.clear();
        self.decided.clear();
        if let Some(p) = self.pending.as_mut() {
            p.cancelled = true;
        }
        Dirty::BOTH
    }

    fn insert_kept(&mut self, key: String) {
        if !self.is_kept(&key) {
            self.kept.push(key.clone());
        }
        self.decided.insert(key);
    }
}

// ---------------------------------------------------------------------------
// DecisionStore: shared, persisted, with the settle delay
// ---------------------------------------------------------------------------

/// Handle to a settle task; await it to observe the applied transition.
pub struct SettleHandle(JoinHandle<()>);

impl SettleHandle {
    pub async fn settled(self) {
        if let Err(e) = self.0.await {
            warn!(error = %e, "settle task failed");
        }
    }
}

/// Outcome of a like/discard call.
pub enum Submission {
    /// Settle delay is zero; the sets are already updated.
    Applied,
    /// The transition will apply once the settle delay elapses.
    Scheduled(SettleHandle),
    /// Another transition was pending; nothing happened.
    Ignored,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Submission::Ignored)
    }

    /// Wait for a scheduled transition; returns immediately otherwise.
    pub async fn settled(self) {
        if let Submission::Scheduled(handle) = self {
            handle.settled().await;
        }
    }
}

/// Cloneable, thread-safe owner of the [`DecisionState`].
#[derive(Clone)]
pub struct DecisionStore {
    state: Arc<Mutex<DecisionState>>,
    persister: Persister,
    settle: Duration,
}

impl DecisionStore {
    pub fn new(state: DecisionState, persister: Persister, settle: Duration) -> Self {
        Self { state: Arc::new(Mutex::new(state)), persister, settle }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle
    }

    fn lock(&self) -> MutexGuard<'_, DecisionState> {
        // Each mutation keeps kept ⊆ decided at every step; poisoned state is valid.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` against a consistent view of the state.
    pub fn read<R>(&self, f: impl FnOnce(&DecisionState) -> R) -> R {
        let guard = self.lock();
        f(&guard)
    }

    pub fn kept(&self) -> Vec<String> {
        self.read(|s| s.kept().to_vec())
    }

    pub fn decided(&self) -> HashSet<String> {
        self.read(|s| s.decided().clone())
    }

    pub fn is_pending(&self) -> bool {
        self.read(DecisionState::is_pending)
    }

    pub fn like(&self, key: &str) -> Submission {
        self.submit(Verdict::Like, key)
    }

    pub fn discard(&self, key: &str) -> Submission {
        self.submit(Verdict::Discard, key)
    }

    /// Remove `key` from kept and decided.  Never subject to the cooldown.
    pub fn remove(&self, key: &str) {
        let mut state = self.lock();
        let dirty = state.remove(key);
        debug!(key, "removed from shortlist");
        self.persist(&state, dirty);
    }

    /// Clear everything.  Never subject to the cooldown.
    pub fn reset_all(&self) {
        let mut state = self.lock();
        let dirty = state.reset();
        debug!("decisions reset");
        self.persist(&state, dirty);
    }

    fn submit(&self, verdict: Verdict, key: &str) -> Submission {
        let mut state = self.lock();
        let now = Instant::now();
        let overdue = state.expire(now);
        if overdue != Dirty::NONE {
            warn!(key, "settle timer late or lost, applied overdue transition");
            self.persist(&state, overdue);
        }
        let Some(id) = state.begin(verdict, key, now + self.settle) else {
            debug!(key, %verdict, "transition pending, ignoring");
            return Submission::Ignored;
        };

        if self.settle.is_zero() {
            let dirty = state.settle(id);
            self.persist(&state, dirty);
            return Submission::Applied;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(key, "no async runtime for settle delay, applying immediately");
                let dirty = state.settle(id);
                self.persist(&state, dirty);
                return Submission::Applied;
            }
        };
        drop(state);

        let store = self.clone();
        let delay = self.settle;
        debug!(key, %verdict, delay_ms = delay.as_millis() as u64, "transition scheduled");
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            store.complete(id);
        });
        Submission::Scheduled(SettleHandle(handle))
    }

    fn complete(&self, id: u64) {
        let mut state = self.lock();
        let dirty = state.settle(id);
        self.persist(&state, dirty);
    }

    fn persist(&self, state: &DecisionState, dirty: Dirty) {
        if dirty.kept {
            self.persist_json(KEY_LIKED, state.kept());
        }
        if dirty.decided {
            self.persist_json(KEY_SEEN, &state.decided_sorted());
        }
    }

    fn persist_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.persister.persist(key, json),
            Err(e) => warn!(key, error = %e, "could not serialize decision state"),
        }
    }
}
