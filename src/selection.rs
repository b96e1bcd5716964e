//! # Stage: Selection Engine
//!
//! ## Responsibility
//! Turn the static dataset plus the category preference into a shuffled
//! presentation order, and derive the current candidate and progress counters
//! from that order and the set of already-decided keys.
//!
//! ## Guarantees
//! - `filter_by_category`, `next_candidate`, `progress` are pure functions
//! - `shuffle` never mutates its input and yields a permutation of it
//! - The presentation order is memoized per `(dataset version, category)`;
//!   decisions never cause a reshuffle, only a preference change or an
//!   explicit [`SelectionEngine::refresh`] does
//!
//! ## NOT Responsible For
//! - Recording decisions (see [`crate::decisions`])

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::dataset::{CandidateRecord, Category, Dataset};

// ---------------------------------------------------------------------------
// Pure selection functions
// ---------------------------------------------------------------------------

/// Whether `record` may be shown under the `preference` category.
pub fn is_eligible(record: &CandidateRecord, preference: Category) -> bool {
    preference == Category::Neutral
        || record.category == Category::Neutral
        || record.category == preference
}

/// Every record eligible under `category`, in dataset order.
pub fn filter_by_category(dataset: &[CandidateRecord], category: Category) -> Vec<CandidateRecord> {
    dataset
        .iter()
        .filter(|r| is_eligible(r, category))
        .cloned()
        .collect()
}

/// Uniform Fisher–Yates shuffle into a new vector.
///
/// Walks from the last index down to 1, swapping each slot with a uniformly
/// chosen index in `0..=i`.
pub fn shuffle<T: Clone, R: Rng + ?Sized>(list: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = list.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

/// First record in `order` whose key has not been decided yet.
///
/// `None` means every candidate has been swiped; callers present that as the
/// "all done" state, not as an error.
pub fn next_candidate<'a>(
    order: &'a [CandidateRecord],
    decided: &HashSet<String>,
) -> Option<&'a CandidateRecord> {
    order.iter().find(|r| !decided.contains(&r.key))
}

/// Undecided records in presentation order.
pub fn remaining<'a>(
    order: &'a [CandidateRecord],
    decided: &HashSet<String>,
) -> Vec<&'a CandidateRecord> {
    order.iter().filter(|r| !decided.contains(&r.key)).collect()
}

/// Seen/total counters for the current filtered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub seen: usize,
    pub total: usize,
}

impl Progress {
    pub fn remaining(&self) -> usize {
        self.total - self.seen
    }

    pub fn is_complete(&self) -> bool {
        self.seen == self.total
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} z {}", self.seen, self.total)
    }
}

/// Count how many records of `order` are already decided.
pub fn progress(order: &[CandidateRecord], decided: &HashSet<String>) -> Progress {
    let seen = order.iter().filter(|r| decided.contains(&r.key)).count();
    Progress { seen, total: order.len() }
}

// ---------------------------------------------------------------------------
// SelectionEngine
// ---------------------------------------------------------------------------

/// Memoization key for the presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderKey {
    dataset_version: u64,
    category: Category,
}

/// Owns the RNG and the memoized shuffled order.
pub struct SelectionEngine {
    rng: StdRng,
    cached: Option<(OrderKey, Vec<CandidateRecord>)>,
    reshuffles: u64,
}

impl SelectionEngine {
    /// Engine seeded from OS entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Engine with a fixed seed; the same seed replays the same orders.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { rng, cached: None, reshuffles: 0 }
    }

    /// The shuffled, filtered order for `category`, recomputed only when the
    /// dataset version or category differs from the cached one.
    pub fn order(&mut self, dataset: &Dataset, category: Category) -> &[CandidateRecord] {
        let key = OrderKey { dataset_version: dataset.version(), category };
        let stale = !matches!(&self.cached, Some((k, _)) if *k == key);
        if stale {
            let filtered = filter_by_category(dataset.records(), category);
            let shuffled = shuffle(&filtered, &mut self.rng);
            self.reshuffles += 1;
            debug!(
                category = %category,
                candidates = shuffled.len(),
                reshuffles = self.reshuffles,
                "presentation order recomputed"
            );
            self.cached = Some((key, shuffled));
        }
        match &self.cached {
            Some((_, order)) => order.as_slice(),
            None => &[],
        }
    }

    /// Drop the memoized order so the next call reshuffles.
    pub fn refresh(&mut self) {
        self.cached = None;
    }
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new()
    }
}
