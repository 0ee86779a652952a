//! Ingredient normalizer
//!
//! Pure text transforms used to build registry query tokens and the
//! canonical ingredient key (ingredient base) that joins the two registries.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Everything from this marker to the end of a product name is dropped.
pub const SUFFIX_MARKER: &str = ">>";

const STOP_WORDS: &[&str] = &["THE", "AND", "OF", "FOR", "WITH", "IN", "A", "AN"];

const SALT_SUFFIXES: &[&str] = &[
    "HYDROCHLORIDE", "HCL", "HCI", "SODIUM", "POTASSIUM", "CALCIUM",
    "MAGNESIUM", "SULFATE", "SULPHATE", "BISULFATE", "PHOSPHATE", "ACETATE",
    "CITRATE", "TARTRATE", "MALEATE", "FUMARATE", "SUCCINATE",
    "CHLORIDE", "BROMIDE", "IODIDE", "NITRATE", "MESYLATE",
    "TOSYLATE", "BESYLATE", "MALATE", "GLUCONATE", "LACTATE",
    "OXALATE", "STEARATE", "PALMITATE", "OLEATE", "BENZOATE",
    "VALERATE", "BUTYRATE", "PROPIONATE", "FORMATE", "ASCORBATE",
    "MONOHYDRATE", "DIHYDRATE", "TRIHYDRATE", "ANHYDROUS",
    "HEMIHYDRATE", "SESQUIHYDRATE",
];

const DOSAGE_FORM_WORDS: &[&str] = &[
    "TABLET", "CAPSULE", "INJECTION", "SOLUTION", "SUSPENSION",
    "CREAM", "OINTMENT", "GEL", "PATCH", "SPRAY", "INHALER",
    "EXTENDED", "RELEASE", "DELAYED", "MODIFIED", "IMMEDIATE",
];

fn word_list_regex(words: &[&str]) -> Regex {
    Regex::new(&format!(r"\b(?:{})\b", words.join("|"))).unwrap()
}

lazy_static! {
    static ref SUFFIX_RE: Regex = Regex::new(&format!("{}.*$", regex::escape(SUFFIX_MARKER))).unwrap();
    static ref NON_WORD_RE: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref SPLIT_RE: Regex = Regex::new(r"(?i);+|\band\b").unwrap();
    static ref BRACKET_RE: Regex = Regex::new(r"\([^)]*\)").unwrap();
    // "%" has no trailing word boundary, the letter units do
    static ref STRENGTH_RE: Regex =
        Regex::new(r"\d+(?:\.\d+)?\s*(?:%|(?:MG|MCG|G|ML|IU|MEQ|MMOL|UNITS?)\b)").unwrap();
    static ref HYDRATE_RE: Regex =
        Regex::new(r"\b(?:MONO|DI|TRI|TETRA|HEMI|SESQUI)?HYDRATE\b").unwrap();
    static ref DOSAGE_FORM_RE: Regex = word_list_regex(DOSAGE_FORM_WORDS);
    static ref SALT_RE: Regex = word_list_regex(SALT_SUFFIXES);
    static ref SEPARATOR_RE: Regex = Regex::new(r"[,;]+").unwrap();
    static ref EDGE_RE: Regex = Regex::new(r"^[-\s]+|[-\s]+$").unwrap();
}

/// Normalize a product name for registry querying.
///
/// Trims, uppercases, drops the suffix-marker segment, replaces punctuation
/// (except hyphens) with spaces and collapses whitespace.
pub fn normalize_product_name(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let without_suffix = SUFFIX_RE.replace(&upper, "");
    let cleaned = NON_WORD_RE.replace_all(&without_suffix, " ");
    WHITESPACE_RE.replace_all(&cleaned, " ").trim().to_string()
}

/// First significant word of a normalized name.
pub fn extract_primary_token(normalized: &str) -> String {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    words
        .iter()
        .find(|w| w.chars().count() >= 3 && !STOP_WORDS.contains(*w))
        .or_else(|| words.first())
        .map(|w| w.to_string())
        .unwrap_or_else(|| normalized.to_string())
}

/// First whitespace-separated word of a normalized name (short-token fallback).
pub fn first_word(normalized: &str) -> &str {
    normalized.split_whitespace().next().unwrap_or("")
}

/// Split raw active-ingredient text into individual ingredient names.
///
/// Splits on semicolons, the word "and", and commas followed by a capitalized
/// word. Commas before digits or lowercase text stay inside the component.
pub fn parse_ingredient_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    SPLIT_RE
        .split(raw)
        .flat_map(split_before_capital)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn split_before_capital(part: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, ch) in part.char_indices() {
        if ch != ',' {
            continue;
        }
        let next = part[idx + 1..].trim_start().chars().next();
        if next.is_some_and(|c| c.is_uppercase()) {
            pieces.push(&part[start..idx]);
            start = idx + 1;
        }
    }
    pieces.push(&part[start..]);
    pieces
}

/// Strip parentheticals, strengths, hydrates, dosage forms and salt words.
pub fn clean_ingredient_token(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let s = BRACKET_RE.replace_all(&upper, " ");
    let s = STRENGTH_RE.replace_all(&s, " ");
    let s = HYDRATE_RE.replace_all(&s, " ");
    let s = DOSAGE_FORM_RE.replace_all(&s, " ");
    let s = SALT_RE.replace_all(&s, " ");
    let s = SEPARATOR_RE.replace_all(&s, " ");
    let s = WHITESPACE_RE.replace_all(&s, " ");
    EDGE_RE.replace_all(s.trim(), "").into_owned()
}

/// Canonical ingredient key: cleaned, deduplicated, sorted, joined with "; ".
pub fn build_ingredient_base(raw: &str) -> String {
    let mut seen = HashSet::new();
    let mut components: Vec<String> = parse_ingredient_list(raw)
        .iter()
        .map(|part| clean_ingredient_token(part))
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.to_uppercase()))
        .collect();

    components.sort();
    components.join("; ")
}

/// Components of an already-built ingredient base (or any ";"-joined term).
pub fn split_components(base: &str) -> Vec<String> {
    base.split(';')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
