//! Record types shared by the pipeline and its collaborators
//!
//! - SourceRecord: one uploaded row
//! - EnrichmentRecord: primary registry match + local-name translation
//! - RegistryProduct: one secondary registry item
//! - ResultRecord / GenericItemRecord / CompactSummaryRecord: the output tables
//! - SummaryMetrics: aggregate counts over a finished run

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row identifier as it appeared in the source sheet (numeric or free text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sequence {
    Number(i64),
    Text(String),
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::Text(String::new())
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Number(n) => write!(f, "{}", n),
            Sequence::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Sequence {
    fn from(value: i64) -> Self {
        Sequence::Number(value)
    }
}

impl From<&str> for Sequence {
    fn from(value: &str) -> Self {
        Sequence::Text(value.to_string())
    }
}

impl From<String> for Sequence {
    fn from(value: String) -> Self {
        Sequence::Text(value)
    }
}

/// Uploaded source row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub sequence: Sequence,
    pub product_name: String,
}

impl SourceRecord {
    pub fn new(sequence: impl Into<Sequence>, product_name: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            product_name: product_name.into(),
        }
    }
}

/// How much of the primary registry query actually came back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// Brand name and ingredient text both returned
    High,
    /// Only one of the two returned
    Medium,
    /// Nothing found; ingredient falls back to the product name
    #[default]
    Review,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Review => "REVIEW",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source row enriched against the primary registry and translated to a local name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRecord {
    pub sequence: Sequence,
    pub product_name: String,

    #[serde(default)]
    pub normalized_name: String,

    #[serde(default)]
    pub primary_brand_name: String,

    #[serde(default)]
    pub primary_generic_name: String,

    #[serde(default)]
    pub application_number: String,

    #[serde(default)]
    pub raw_active_ingredients: String,

    /// Canonical ingredient key
    #[serde(default)]
    pub ingredient_base: String,

    #[serde(default)]
    pub confidence: Confidence,

    #[serde(default)]
    pub local_ingredient_name: String,

    /// Exact term sent to the secondary registry
    #[serde(default)]
    pub local_search_term: String,

    #[serde(default)]
    pub local_name_mapped: bool,

    /// Explicit term supplied by manual mapping; bypasses translation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_search_term: Option<String>,
}

impl EnrichmentRecord {
    /// Copy of a cached record re-labelled with another row's identifiers.
    pub fn for_source(&self, source: &SourceRecord) -> Self {
        Self {
            sequence: source.sequence.clone(),
            product_name: source.product_name.clone(),
            ..self.clone()
        }
    }

    /// Row still has no local ingredient name and needs a manual mapping.
    pub fn needs_manual_mapping(&self) -> bool {
        self.local_ingredient_name.trim().is_empty()
    }

    /// Fill the local name from a manual mapping.
    ///
    /// Returns false (and leaves the record untouched) for a blank name.
    pub fn apply_manual_mapping(&mut self, local_name: &str) -> bool {
        let name = local_name.trim();
        if name.is_empty() {
            return false;
        }
        self.local_ingredient_name = name.to_string();
        self.local_search_term = name.to_string();
        self.local_name_mapped = true;
        self.manual_search_term = Some(name.to_string());
        true
    }

    /// Term for the secondary registry: manual override > dictionary mapping > raw fallback.
    pub fn effective_search_term(&self) -> SearchTerm {
        if let Some(term) = self
            .manual_search_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return SearchTerm::Override(term.to_string());
        }

        let local = self.local_search_term.trim();
        if !local.is_empty() {
            return if self.local_name_mapped {
                SearchTerm::Mapped(local.to_string())
            } else {
                SearchTerm::Fallback(local.to_string())
            };
        }

        SearchTerm::Fallback(self.ingredient_base.trim().to_string())
    }
}

/// Resolved search term and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTerm {
    Override(String),
    Mapped(String),
    Fallback(String),
}

impl SearchTerm {
    pub fn term(&self) -> &str {
        match self {
            SearchTerm::Override(t) | SearchTerm::Mapped(t) | SearchTerm::Fallback(t) => t,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, SearchTerm::Override(_))
    }

    pub fn was_mapped(&self) -> bool {
        !matches!(self, SearchTerm::Fallback(_))
    }
}

/// One secondary registry item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryProduct {
    pub item_code: String,
    pub product_name: String,
    pub manufacturer: String,
    pub dosage_form: String,
    /// Raw new/original drug classification text
    #[serde(default)]
    pub classification: String,
    pub is_original: bool,
    pub is_revoked: bool,
    #[serde(default)]
    pub ingredient_text: String,
}

/// Original-product column of the result table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginalStatus {
    #[serde(rename = "Y")]
    Present,
    #[serde(rename = "N")]
    Absent,
    #[default]
    #[serde(rename = "-")]
    NotFound,
}

impl OriginalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginalStatus::Present => "Y",
            OriginalStatus::Absent => "N",
            OriginalStatus::NotFound => "-",
        }
    }
}

impl fmt::Display for OriginalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-row counting result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub sequence: Sequence,
    pub product_name: String,
    pub normalized_name: String,
    pub ingredient_base: String,
    pub local_ingredient_name: String,
    pub local_search_term: String,
    pub local_name_mapped: bool,
    pub confidence: Confidence,
    pub has_original: OriginalStatus,
    pub generic_count: usize,
    pub total_count: usize,
    pub not_found: bool,
}

/// One generic product attributed to a source row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericItemRecord {
    pub source_sequence: Sequence,
    pub source_product_name: String,
    pub ingredient_base: String,
    pub item_code: String,
    pub product_name: String,
    pub manufacturer: String,
    pub dosage_form: String,
    pub classification: String,
    pub is_revoked: bool,
}

/// Per-row generic summary with the joined product names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactSummaryRecord {
    pub sequence: Sequence,
    pub product_name: String,
    pub ingredient_base: String,
    pub generic_count: usize,
    pub joined_product_names: String,
}

/// Aggregate counts over one finished run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub total_rows: usize,
    pub review_count: usize,
    pub not_found_count: usize,
    pub confidence_high: usize,
    pub confidence_medium: usize,
    pub confidence_review: usize,
    /// Rows without a dictionary or manual mapping
    pub unmapped_count: usize,
    pub total_generic_item_rows: usize,
    pub average_generic_per_source: f64,
    pub validation_errors: Vec<String>,
}

/// Counting key for generic/total counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountMode {
    /// Every product counts
    #[default]
    #[serde(rename = "ingredient")]
    Ingredient,
    /// Distinct (ingredient base, dosage form) pairs count
    #[serde(rename = "ingredient+form")]
    IngredientAndForm,
}

impl std::str::FromStr for CountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ingredient" => Ok(CountMode::Ingredient),
            "ingredient+form" | "ingredient-form" | "form" => Ok(CountMode::IngredientAndForm),
            _ => Err(format!(
                "Unknown count mode: {}. Use ingredient or ingredient+form",
                s
            )),
        }
    }
}

impl fmt::Display for CountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountMode::Ingredient => write!(f, "ingredient"),
            CountMode::IngredientAndForm => write!(f, "ingredient+form"),
        }
    }
}
