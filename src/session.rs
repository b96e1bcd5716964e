//! # Stage: Session
//!
//! ## Responsibility
//! The explicitly constructed application state.  Owns the dataset, the
//! preference config, the selection engine, and the decision store; loads
//! them from storage once at startup and persists after every mutation.
//!
//! ## Guarantees
//! - Startup never fails because of persisted data: each key falls back to
//!   its default independently
//! - The presentation order survives decisions and only changes with the
//!   category, the dataset, or [`Session::refresh_order`]
//! - [`Session::close`] returns only after every queued write is applied
//!
//! ## NOT Responsible For
//! - Rendering or input handling (see the `mimi-match` binary)

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dataset::{CandidateRecord, Category, Dataset};
use crate::decisions::{DecisionState, DecisionStore, Submission, DEFAULT_SETTLE};
use crate::display;
use crate::selection::{self, Progress, SelectionEngine};
use crate::settings::PreferenceConfig;
use crate::storage::{self, KeyValueStore, Persister, KEY_LIKED, KEY_SEEN, KEY_SETTINGS};

/// How a session is wired up.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub settle: Duration,
    /// Fixed shuffle seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Drain writes on a background task.  Requires a tokio runtime.
    pub background_writes: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { settle: DEFAULT_SETTLE, seed: None, background_writes: true }
    }
}

impl SessionOptions {
    /// Synchronous writes and no settle delay; handy for one-shot commands.
    pub fn immediate() -> Self {
        Self { settle: Duration::ZERO, seed: None, background_writes: false }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

pub struct Session {
    dataset: Dataset,
    settings: PreferenceConfig,
    engine: SelectionEngine,
    decisions: DecisionStore,
    persister: Persister,
    writer: Option<JoinHandle<()>>,
}

impl Session {
    /// Load persisted state from `store` and assemble the session.
    pub fn open(dataset: Dataset, store: Arc<dyn KeyValueStore>, options: SessionOptions) -> Self {
        let settings: PreferenceConfig = storage::load_or_default(store.as_ref(), KEY_SETTINGS);
        let liked: Vec<String> = storage::load_or_default(store.as_ref(), KEY_LIKED);
        let seen: Vec<String> = storage::load_or_default(store.as_ref(), KEY_SEEN);
        let seen: HashSet<String> = seen.into_iter().collect();

        let state = DecisionState::from_parts(liked, seen);
        info!(
            kept = state.kept().len(),
            decided = state.decided().len(),
            category = %settings.category,
            "session state loaded"
        );

        let background = options.background_writes && tokio::runtime::Handle::try_current().is_ok();
        if options.background_writes && !background {
            warn!("no async runtime for background writes, writing inline");
        }
        let (persister, writer) = if background {
            let (p, handle) = Persister::spawn(store);
            (p, Some(handle))
        } else {
            (Persister::inline(store), None)
        };

        let engine = match options.seed {
            Some(seed) => SelectionEngine::seeded(seed),
            None => SelectionEngine::new(),
        };

        Self {
            dataset,
            settings,
            engine,
            decisions: DecisionStore::new(state, persister.clone(), options.settle),
            persister,
            writer,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn settings(&self) -> &PreferenceConfig {
        &self.settings
    }

    pub fn decisions(&self) -> &DecisionStore {
        &self.decisions
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Filtered, shuffled presentation order for the current category.
    pub fn order(&mut self) -> &[CandidateRecord] {
        self.engine.order(&self.dataset, self.settings.category)
    }

    /// The next undecided record, or `None` once everything has been swiped.
    pub fn current_candidate(&mut self) -> Option<CandidateRecord> {
        let order = self.engine.order(&self.dataset, self.settings.category);
        self.decisions
            .read(|s| selection::next_candidate(order, s.decided()).cloned())
    }

    pub fn progress(&mut self) -> Progress {
        let order = self.engine.order(&self.dataset, self.settings.category);
        self.decisions.read(|s| selection::progress(order, s.decided()))
    }

    pub fn kept(&self) -> Vec<String> {
        self.decisions.kept()
    }

    /// Shortlist entries composed with the surname, one per line.
    pub fn share_text(&self) -> String {
        display::share_text(&self.decisions.kept(), &self.settings.label)
    }

    /// One shortlist line for `key`, or `None` when it is not kept.
    pub fn shortlist_entry(&self, key: &str) -> Option<String> {
        self.decisions
            .read(|s| s.is_kept(key))
            .then(|| display::shortlist_entry(key, &self.settings.label))
    }

    // -----------------------------------------------------------------------
    // Decision mutators
    // -----------------------------------------------------------------------

    /// Like whatever is currently shown.  Ignored when exhausted or pending.
    pub fn like_current(&mut self) -> Submission {
        match self.current_for_submit() {
            Some(key) => self.decisions.like(&key),
            None => Submission::Ignored,
        }
    }

    /// Discard whatever is currently shown.  Ignored when exhausted or pending.
    pub fn discard_current(&mut self) -> Submission {
        match self.current_for_submit() {
            Some(key) => self.decisions.discard(&key),
            None => Submission::Ignored,
        }
    }

    fn current_for_submit(&mut self) -> Option<String> {
        if self.decisions.is_pending() {
            debug!("transition pending, swipe ignored");
            return None;
        }
        self.current_candidate().map(|r| r.key)
    }

    pub fn like(&self, key: &str) -> Submission {
        self.decisions.like(key)
    }

    pub fn discard(&self, key: &str) -> Submission {
        self.decisions.discard(key)
    }

    /// Take `key` off the shortlist; it becomes a candidate again.
    pub fn remove(&self, key: &str) {
        self.decisions.remove(key);
    }

    pub fn reset_all(&self) {
        self.decisions.reset_all();
    }

    // -----------------------------------------------------------------------
    // Preference mutators
    // -----------------------------------------------------------------------

    pub fn set_category(&mut self, category: Category) {
        self.settings.set_category(category);
        self.persist_settings();
    }

    pub fn set_label(&mut self, text: impl Into<String>) {
        self.settings.set_label(text);
        self.persist_settings();
    }

    /// Reshuffle the current category on the next query.
    pub fn refresh_order(&mut self) {
        self.engine.refresh();
    }

    fn persist_settings(&self) {
        match serde_json::to_string(&self.settings) {
            Ok(json) => self.persister.persist(KEY_SETTINGS, json),
            Err(e) => warn!(error = %e, "could not serialize settings"),
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Flush queued writes and stop the background writer.
    ///
    /// Any settle task still sleeping holds the writer open until it has
    /// applied and persisted its transition.
    pub async fn close(self) {
        let Session { persister, decisions, writer, .. } = self;
        persister.flush().await;
        drop(decisions);
        drop(persister);
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "persistence writer failed");
            }
        }
        debug!("session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            CandidateRecord::new(Category::Boy, "Jan"),
            CandidateRecord::new(Category::Girl, "Eva"),
            CandidateRecord::new(Category::Neutral, "Sam"),
        ])
    }

    fn session_with(store: Arc<MemoryStore>) -> Session {
        Session::open(dataset(), store, SessionOptions::immediate().with_seed(11))
    }

    #[test]
    fn test_fresh_session_uses_defaults() {
        let mut s = session_with(Arc::new(MemoryStore::new()));
        assert_eq!(s.settings(), &PreferenceConfig::default());
        assert!(s.kept().is_empty());
        assert_eq!(s.progress(), Progress { seen: 0, total: 2 });
    }

    #[test]
    fn test_order_is_stable_across_decisions() {
        let mut s = session_with(Arc::new(MemoryStore::new()));
        let before = s.order().to_vec();
        s.like_current();
        s.discard_current();
        assert_eq!(s.order(), before.as_slice());
    }

    #[test]
    fn test_like_current_advances_candidate() {
        let mut s = session_with(Arc::new(MemoryStore::new()));
        let first = s.current_candidate().unwrap();
        assert!(s.like_current().is_accepted());
        let second = s.current_candidate().unwrap();
        assert_ne!(first.key, second.key);
        assert_eq!(s.kept(), vec![first.key]);
    }

    #[test]
    fn test_exhausted_swipe_is_ignored() {
        let mut s = session_with(Arc::new(MemoryStore::new()));
        s.discard_current();
        s.discard_current();
        assert!(s.current_candidate().is_none());
        assert!(!s.like_current().is_accepted());
        assert_eq!(s.progress(), Progress { seen: 2, total: 2 });
    }

    #[test]
    fn test_settings_persist_on_change() {
        let store = Arc::new(MemoryStore::new());
        let mut s = session_with(store.clone());
        s.set_label("Novák");
        s.set_category(Category::Boy);
        assert_eq!(
            store.get(KEY_SETTINGS).unwrap().as_deref(),
            Some(r#"{"surname":"Novák","gender":"MUZ"}"#)
        );
    }

    #[test]
    fn test_reopen_restores_everything() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut s = session_with(store.clone());
            s.set_label("novák");
            s.like("Eva");
            s.discard("Sam");
        }
        let mut s = session_with(store);
        assert_eq!(s.settings().label, "novák");
        assert_eq!(s.kept(), vec!["Eva".to_string()]);
        assert!(s.current_candidate().is_none());
        assert_eq!(s.share_text(), "Eva Novák");
    }

    #[test]
    fn test_shortlist_entry_only_for_kept_names() {
        let mut s = Session::open(dataset(), Arc::new(MemoryStore::new()), SessionOptions::immediate());
        s.set_label("dvořák");
        s.like("Eva");
        s.discard("Sam");
        assert_eq!(s.shortlist_entry("Eva").as_deref(), Some("Eva Dvořák"));
        assert_eq!(s.shortlist_entry("Sam"), None);
        assert_eq!(s.shortlist_entry("Jan"), None);
    }

    #[test]
    fn test_malformed_key_falls_back_alone() {
        let store = Arc::new(
            MemoryStore::new()
                .with_entry(KEY_SETTINGS, r#"{"surname":"Svoboda","gender":"MUZ"}"#)
                .with_entry(KEY_LIKED, "not json")
                .with_entry(KEY_SEEN, r#"["Jan"]"#),
        );
        let mut s = session_with(store);
        assert_eq!(s.settings().label, "Svoboda");
        assert!(s.kept().is_empty());
        assert_eq!(s.progress(), Progress { seen: 1, total: 2 });
    }

    #[test]
    fn test_category_change_keeps_decisions() {
        let mut s = session_with(Arc::new(MemoryStore::new()));
        s.discard("Jan");
        s.like("Eva");
        s.set_category(Category::Boy);
        assert_eq!(s.progress(), Progress { seen: 1, total: 2 });
        assert_eq!(s.current_candidate().unwrap().key, "Sam");
        assert_eq!(s.kept(), vec!["Eva".to_string()]);
    }

    #[tokio::test]
    async fn test_close_flushes_background_writes() {
        let store = Arc::new(MemoryStore::new());
        let options = SessionOptions { settle: Duration::ZERO, seed: Some(1), background_writes: true };
        let s = Session::open(dataset(), store.clone(), options);
        s.like("Eva");
        s.close().await;
        assert_eq!(store.get(KEY_LIKED).unwrap().as_deref(), Some(r#"["Eva"]"#));
    }

    #[tokio::test]
    async fn test_close_waits_for_pending_settle() {
        let store = Arc::new(MemoryStore::new());
        let options = SessionOptions {
            settle: Duration::from_millis(30),
            seed: Some(1),
            background_writes: true,
        };
        let mut s = Session::open(dataset(), store.clone(), options);
        assert!(s.discard_current().is_accepted());
        s.close().await;
        let seen: Vec<String> = serde_json::from_str(&store.get(KEY_SEEN).unwrap().unwrap()).unwrap();
        assert_eq!(seen.len(), 1);
    }
}
