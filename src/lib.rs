//! # mimi-match
//!
//! Swipe through a dataset of baby names, keep the ones you like, and review
//! the shortlist later.
//!
//! - [`dataset`]: immutable candidate records and categories
//! - [`selection`]: filtering, shuffling, next candidate, progress
//! - [`decisions`]: kept/decided sets with the settle-delay guard
//! - [`settings`]: category filter and surname
//! - [`storage`]: key-value persistence and the background writer
//! - [`session`]: the application state tying it all together
//! - [`display`]: name composition and sharing
//! - [`config`]: config file and path resolution
//! - [`cli`]: command-line arguments and terminal rendering

pub mod cli;
pub mod config;
pub mod dataset;
pub mod decisions;
pub mod display;
pub mod error;
pub mod selection;
pub mod session;
pub mod settings;
pub mod storage;

pub use dataset::{CandidateRecord, Category, Dataset};
pub use decisions::{DecisionState, DecisionStore, Submission, Verdict};
pub use error::{MatchError, Result};
pub use selection::{Progress, SelectionEngine};
pub use session::{Session, SessionOptions};
pub use settings::PreferenceConfig;
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
