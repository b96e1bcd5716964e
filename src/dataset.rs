//! # Stage: Dataset Provider
//!
//! ## Responsibility
//! Supply the immutable, ordered list of candidate names the rest of the crate
//! selects from.  Records come either from the dataset bundled into the binary
//! or from a JSON file supplied by the user.
//!
//! ## Guarantees
//! - Immutable after construction: no write access from the selection or
//!   decision layers
//! - Versioned: [`Dataset::version`] is a content fingerprint, stable for the
//!   same records in the same order
//!
//! ## NOT Responsible For
//! - Deduplicating keys.  Duplicates are reported by
//!   [`Dataset::duplicate_keys`] and logged on load, but left in place.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MatchError, Result};

const BUNDLED_NAMES: &str = include_str!("../data/names.json");

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Gender-like tag carried by every record and by the category preference.
///
/// A `Neutral` record is eligible under any preference; a `Neutral`
/// preference means "show all".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Category {
    #[serde(rename = "MUZ", alias = "boy", alias = "A")]
    Boy,
    #[default]
    #[serde(rename = "ZENA", alias = "girl", alias = "B")]
    Girl,
    #[serde(rename = "NEUTRALNI", alias = "neutral")]
    Neutral,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Boy => write!(f, "boy"),
            Category::Girl => write!(f, "girl"),
            Category::Neutral => write!(f, "neutral"),
        }
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord
// ---------------------------------------------------------------------------

/// One name from the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(rename = "gender", alias = "category")]
    pub category: Category,
    /// The name itself; unique within a well-formed dataset.
    #[serde(rename = "name", alias = "key")]
    pub key: String,
    /// Optional trivia shown under the name.
    #[serde(
        rename = "fact",
        alias = "annotation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub annotation: Option<String>,
}

impl CandidateRecord {
    pub fn new(category: Category, key: impl Into<String>) -> Self {
        Self { category, key: key.into(), annotation: None }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Immutable ordered collection of candidate records.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<CandidateRecord>,
    version: u64,
}

impl Dataset {
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        let mut hasher = DefaultHasher::new();
        records.hash(&mut hasher);
        let version = hasher.finish();
        Self { records, version }
    }

    /// The dataset compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_NAMES)
    }

    /// Parse a JSON array of records.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<CandidateRecord> = serde_json::from_str(json)?;
        let dataset = Self::new(records);
        let dups = dataset.duplicate_keys();
        if !dups.is_empty() {
            warn!(duplicates = ?dups, "dataset contains duplicate names; they will collapse in tracking");
        }
        debug!(records = dataset.len(), version = dataset.version, "dataset loaded");
        Ok(dataset)
    }

    /// Read and parse a JSON dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MatchError::Dataset(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn records(&self) -> &[CandidateRecord] {
        &self.records
    }

    /// Content fingerprint used to key the memoized presentation order.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys that appear more than once, in first-repeat order.
    pub fn duplicate_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut dups = Vec::new();
        for r in &self.records {
            if !seen.insert(r.key.as_str()) && reported.insert(r.key.as_str()) {
                dups.push(r.key.clone());
            }
        }
        dups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_dataset_parses() {
        let ds = Dataset::bundled().unwrap();
        assert!(!ds.is_empty());
        assert!(ds.records().iter().any(|r| r.category == Category::Boy));
        assert!(ds.records().iter().any(|r| r.category == Category::Girl));
        assert!(ds.records().iter().any(|r| r.category == Category::Neutral));
    }

    #[test]
    fn test_bundled_dataset_has_unique_keys() {
        let ds = Dataset::bundled().unwrap();
        assert!(ds.duplicate_keys().is_empty());
    }

    #[test]
    fn test_record_parses_original_field_names() {
        let json = r#"[{"gender":"ZENA","name":"Eva","fact":"Hebrew origin"}]"#;
        let ds = Dataset::from_json(json).unwrap();
        let r = &ds.records()[0];
        assert_eq!(r.category, Category::Girl);
        assert_eq!(r.key, "Eva");
        assert_eq!(r.annotation.as_deref(), Some("Hebrew origin"));
    }

    #[test]
    fn test_record_parses_alias_field_names() {
        let json = r#"[{"category":"neutral","key":"Sam"}]"#;
        let ds = Dataset::from_json(json).unwrap();
        assert_eq!(ds.records()[0].category, Category::Neutral);
        assert!(ds.records()[0].annotation.is_none());
    }

    #[test]
    fn test_record_serializes_without_missing_fact() {
        let r = CandidateRecord::new(Category::Boy, "Jan");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"gender":"MUZ","name":"Jan"}"#);
    }

    #[test]
    fn test_invalid_json_is_json_error() {
        let err = Dataset::from_json("not json").unwrap_err();
        assert!(matches!(err, MatchError::Json(_)));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = Dataset::from_json(r#"[{"gender":"OTHER","name":"X"}]"#).unwrap_err();
        assert!(matches!(err, MatchError::Json(_)));
    }

    #[test]
    fn test_version_is_content_fingerprint() {
        let a = Dataset::new(vec![CandidateRecord::new(Category::Boy, "Jan")]);
        let b = Dataset::new(vec![CandidateRecord::new(Category::Boy, "Jan")]);
        let c = Dataset::new(vec![CandidateRecord::new(Category::Girl, "Jan")]);
        assert_eq!(a.version(), b.version());
        assert_ne!(a.version(), c.version());
    }

    #[test]
    fn test_duplicate_keys_reported_once() {
        let ds = Dataset::new(vec![
            CandidateRecord::new(Category::Boy, "Alex"),
            CandidateRecord::new(Category::Girl, "Alex"),
            CandidateRecord::new(Category::Neutral, "Alex"),
            CandidateRecord::new(Category::Girl, "Eva"),
        ]);
        assert_eq!(ds.duplicate_keys(), vec!["Alex".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.json");
        std::fs::write(&path, r#"[{"gender":"MUZ","name":"Jan"}]"#).unwrap();
        let ds = Dataset::load(&path).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_dataset_error() {
        let err = Dataset::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, MatchError::Dataset(_)));
    }

    #[test]
    fn test_category_display_is_lowercase() {
        assert_eq!(Category::Boy.to_string(), "boy");
        assert_eq!(Category::Girl.to_string(), "girl");
        assert_eq!(Category::Neutral.to_string(), "neutral");
    }

    #[test]
    fn test_category_default_is_girl() {
        assert_eq!(Category::default(), Category::Girl);
    }
}
