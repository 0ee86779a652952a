//! Drugmatch common library
//!
//! Pure, I/O-free parts of the pipeline: the record types exchanged with
//! collaborators, the ingredient normalizer and the local-name dictionary.

pub mod types;
pub mod normalizer;
pub mod dictionary;
pub mod error;

pub use types::{
    CompactSummaryRecord, Confidence, CountMode, EnrichmentRecord, GenericItemRecord,
    OriginalStatus, RegistryProduct, ResultRecord, SearchTerm, Sequence, SourceRecord,
    SummaryMetrics,
};
pub use normalizer::{
    build_ingredient_base, clean_ingredient_token, extract_primary_token, first_word,
    normalize_product_name, parse_ingredient_list, split_components,
};
pub use dictionary::{DictionaryOverlay, LocalNameDictionary, Translation};
pub use error::{Error, Result};
