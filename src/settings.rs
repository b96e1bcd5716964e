//! User preferences: which category to browse and the family surname shown
//! after every name.

use serde::{Deserialize, Serialize};

use crate::dataset::Category;

/// Category filter plus a free-text display label.
///
/// Persisted under the `settings` key as `{"surname": ..., "gender": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceConfig {
    /// Family surname; display only, never used for filtering.
    #[serde(rename = "surname", alias = "label", default)]
    pub label: String,
    #[serde(rename = "gender", alias = "category", default)]
    pub category: Category,
}

impl PreferenceConfig {
    pub fn new(label: impl Into<String>, category: Category) -> Self {
        Self { label: label.into(), category }
    }

    /// Replace the category.  Decision sets are deliberately left alone.
    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }

    /// Replace the label verbatim; empty is allowed.
    pub fn set_label(&mut self, text: impl Into<String>) {
        self.label = text.into();
    }
}
