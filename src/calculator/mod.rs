//! Generic-count calculator
//!
//! For each enrichment row: look up the secondary registry, split products
//! into original and generic, count per count mode and emit the generic
//! item rows. The compact summary is built afterwards and cross-checked
//! against the result table.

pub mod summary;

use crate::cancel::{CancellationToken, Cancelled};
use crate::progress::{ProgressSink, ProgressUpdate, Stage};
use crate::registry::{LookupOutcome, ProductSource};
use drugmatch_common::{
    CompactSummaryRecord, CountMode, EnrichmentRecord, GenericItemRecord, OriginalStatus,
    RegistryProduct, ResultRecord, Sequence,
};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

pub use summary::summarize;

#[derive(Debug, Clone, Copy, Default)]
pub struct CalculationOptions {
    pub count_mode: CountMode,
    pub include_revoked: bool,
    /// Pause between rows
    pub row_delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CalculationOutput {
    pub results: Vec<ResultRecord>,
    pub generic_items: Vec<GenericItemRecord>,
    pub compact_summaries: Vec<CompactSummaryRecord>,
    pub validation_errors: Vec<String>,
}

/// Run the secondary lookups row by row and build all three tables.
pub async fn compute(
    enrichment: &[EnrichmentRecord],
    options: CalculationOptions,
    products: &dyn ProductSource,
    cancel: &CancellationToken,
    progress: &dyn ProgressSink,
) -> Result<CalculationOutput, Cancelled> {
    let total = enrichment.len();
    let mut results = Vec::with_capacity(total);
    let mut generic_items = Vec::new();

    for (index, record) in enrichment.iter().enumerate() {
        cancel.check()?;
        if index > 0 {
            tokio::time::sleep(options.row_delay).await;
            cancel.check()?;
        }

        let term = record.effective_search_term();
        progress.report(&ProgressUpdate::new(
            Stage::Matching,
            index,
            total,
            format!("Querying registry: {}", term.term()),
        ));

        let outcome = products
            .lookup(&term, options.include_revoked, cancel)
            .await?;
        let (result, items) = calculate_row(record, &outcome, options.count_mode);
        debug!(
            sequence = %record.sequence,
            generic = result.generic_count,
            total = result.total_count,
            "row counted"
        );
        results.push(result);
        generic_items.extend(items);
    }

    progress.report(&ProgressUpdate::new(Stage::Matching, total, total, "Registry lookups complete"));

    let (compact_summaries, compact_errors) =
        build_compact_summaries(enrichment, &results, &generic_items);
    let validation_errors = merge_messages(compact_errors, validate_results(&results));
    for error in &validation_errors {
        warn!(%error, "validation");
    }

    Ok(CalculationOutput {
        results,
        generic_items,
        compact_summaries,
        validation_errors,
    })
}

/// Counting key of a product
fn count_key(ingredient_base: &str, product: &RegistryProduct, mode: CountMode) -> String {
    match mode {
        CountMode::Ingredient => ingredient_base.to_string(),
        CountMode::IngredientAndForm => {
            format!("{}__{}", ingredient_base, product.dosage_form.trim())
        }
    }
}

/// Count one row. Returns the result row and its generic item rows.
pub fn calculate_row(
    record: &EnrichmentRecord,
    outcome: &LookupOutcome,
    mode: CountMode,
) -> (ResultRecord, Vec<GenericItemRecord>) {
    let products = &outcome.products;
    let not_found = products.is_empty();
    let base = record.ingredient_base.as_str();

    let has_original = products.iter().any(|p| p.is_original);
    let generics: Vec<&RegistryProduct> = products.iter().filter(|p| !p.is_original).collect();

    let (generic_count, total_count) = match mode {
        CountMode::Ingredient => (generics.len(), products.len()),
        CountMode::IngredientAndForm => {
            let generic_keys: HashSet<String> =
                generics.iter().map(|p| count_key(base, p, mode)).collect();
            let all_keys: HashSet<String> =
                products.iter().map(|p| count_key(base, p, mode)).collect();
            (generic_keys.len(), all_keys.len())
        }
    };

    let counted: Vec<&RegistryProduct> = match mode {
        CountMode::Ingredient => generics,
        CountMode::IngredientAndForm => {
            let mut seen = HashSet::new();
            generics
                .into_iter()
                .filter(|p| seen.insert(count_key(base, p, mode)))
                .collect()
        }
    };

    let items = counted
        .into_iter()
        .map(|p| GenericItemRecord {
            source_sequence: record.sequence.clone(),
            source_product_name: record.product_name.clone(),
            ingredient_base: record.ingredient_base.clone(),
            item_code: p.item_code.clone(),
            product_name: p.product_name.clone(),
            manufacturer: p.manufacturer.clone(),
            dosage_form: p.dosage_form.clone(),
            classification: p.classification.clone(),
            is_revoked: p.is_revoked,
        })
        .collect();

    let search_term = if outcome.search_term_used.is_empty() {
        record.local_search_term.clone()
    } else {
        outcome.search_term_used.clone()
    };

    let result = ResultRecord {
        sequence: record.sequence.clone(),
        product_name: record.product_name.clone(),
        normalized_name: record.normalized_name.clone(),
        ingredient_base: record.ingredient_base.clone(),
        local_ingredient_name: record.local_ingredient_name.clone(),
        local_search_term: search_term,
        local_name_mapped: outcome.was_mapped,
        confidence: record.confidence,
        has_original: if not_found {
            OriginalStatus::NotFound
        } else if has_original {
            OriginalStatus::Present
        } else {
            OriginalStatus::Absent
        },
        generic_count: if not_found { 0 } else { generic_count },
        total_count: if not_found { 0 } else { total_count },
        not_found,
    };

    (result, items)
}

/// One compact row per enrichment row, plus cross-table mismatches.
pub fn build_compact_summaries(
    enrichment: &[EnrichmentRecord],
    results: &[ResultRecord],
    generic_items: &[GenericItemRecord],
) -> (Vec<CompactSummaryRecord>, Vec<String>) {
    let mut items_by_sequence: HashMap<&Sequence, Vec<&GenericItemRecord>> = HashMap::new();
    for item in generic_items {
        items_by_sequence
            .entry(&item.source_sequence)
            .or_default()
            .push(item);
    }

    let mut errors = Vec::new();
    let summaries = enrichment
        .iter()
        .map(|record| {
            let items = items_by_sequence
                .get(&record.sequence)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let generic_count = results
                .iter()
                .find(|r| r.sequence == record.sequence)
                .map(|r| r.generic_count)
                .unwrap_or(0);

            if items.len() != generic_count {
                let message = format!(
                    "Row {}: generic item rows ({}) != result generic count ({})",
                    record.sequence,
                    items.len(),
                    generic_count
                );
                if !errors.contains(&message) {
                    errors.push(message);
                }
            }

            CompactSummaryRecord {
                sequence: record.sequence.clone(),
                product_name: record.product_name.clone(),
                ingredient_base: record.ingredient_base.clone(),
                generic_count,
                joined_product_names: items
                    .iter()
                    .map(|item| item.product_name.as_str())
                    .collect::<Vec<_>>()
                    .join(" | "),
            }
        })
        .collect();

    (summaries, errors)
}

/// Result rows that break the not-found or count invariants
pub fn validate_results(results: &[ResultRecord]) -> Vec<String> {
    results
        .iter()
        .filter_map(|r| {
            if r.not_found && (r.generic_count != 0 || r.total_count != 0) {
                Some(format!("Row {}: not found but counts are non-zero", r.sequence))
            } else if r.generic_count > r.total_count {
                Some(format!(
                    "Row {}: generic count ({}) exceeds total count ({})",
                    r.sequence, r.generic_count, r.total_count
                ))
            } else {
                None
            }
        })
        .collect()
}

/// Both lists in order, each message kept once
pub fn merge_messages(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|message| seen.insert(message.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drugmatch_common::Confidence;

    fn record(seq: i64, base: &str) -> EnrichmentRecord {
        EnrichmentRecord {
            sequence: Sequence::Number(seq),
            product_name: format!("Product {}", seq),
            ingredient_base: base.into(),
            confidence: Confidence::High,
            local_search_term: "아토르바스타틴".into(),
            local_name_mapped: true,
            ..Default::default()
        }
    }

    fn product(name: &str, form: &str, original: bool) -> RegistryProduct {
        RegistryProduct {
            item_code: format!("code-{}", name),
            product_name: name.into(),
            dosage_form: form.into(),
            is_original: original,
            classification: if original { "신약".into() } else { String::new() },
            ..Default::default()
        }
    }

    fn outcome(products: Vec<RegistryProduct>) -> LookupOutcome {
        LookupOutcome {
            products,
            search_term_used: "아토르바스타틴".into(),
            was_mapped: true,
        }
    }

    #[test]
    fn test_ingredient_mode_counts() {
        let found = outcome(vec![
            product("리피토정", "정제", true),
            product("아토르바정", "정제", false),
            product("아토르캡슐", "캡슐", false),
        ]);
        let (result, items) = calculate_row(&record(1, "ATORVASTATIN"), &found, CountMode::Ingredient);

        assert_eq!(result.has_original, OriginalStatus::Present);
        assert_eq!(result.generic_count, 2);
        assert_eq!(result.total_count, 3);
        assert!(!result.not_found);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.source_sequence == Sequence::Number(1)));
    }

    #[test]
    fn test_form_mode_counts_distinct_forms() {
        let found = outcome(vec![
            product("리피토정", "정제", true),
            product("아토르바정", "정제", false),
            product("아토르정2", "정제", false),
            product("아토르캡슐", "캡슐", false),
        ]);
        let (result, items) =
            calculate_row(&record(1, "ATORVASTATIN"), &found, CountMode::IngredientAndForm);

        assert_eq!(result.generic_count, 2);
        assert_eq!(result.total_count, 2);
        assert_eq!(items.len(), result.generic_count);
        assert_eq!(items[0].product_name, "아토르바정");
        assert_eq!(items[1].product_name, "아토르캡슐");
    }

    #[test]
    fn test_not_found_row() {
        let (result, items) =
            calculate_row(&record(3, "UNOBTANIUM"), &outcome(vec![]), CountMode::Ingredient);

        assert!(result.not_found);
        assert_eq!(result.has_original, OriginalStatus::NotFound);
        assert_eq!((result.generic_count, result.total_count), (0, 0));
        assert!(items.is_empty());
    }

    #[test]
    fn test_only_generics_is_absent() {
        let found = outcome(vec![product("제네릭정", "정제", false)]);
        let (result, _) = calculate_row(&record(1, "X"), &found, CountMode::Ingredient);
        assert_eq!(result.has_original, OriginalStatus::Absent);
        assert_eq!(result.generic_count, 1);
    }

    #[test]
    fn test_compact_summary_and_validation() {
        let rows = vec![record(1, "A"), record(2, "B")];
        let found = outcome(vec![product("가정", "정제", false), product("나정", "정제", false)]);
        let (r1, i1) = calculate_row(&rows[0], &found, CountMode::Ingredient);
        let (r2, i2) = calculate_row(&rows[1], &outcome(vec![]), CountMode::Ingredient);
        let results = vec![r1, r2];
        let items: Vec<_> = i1.into_iter().chain(i2).collect();

        let (compact, errors) = build_compact_summaries(&rows, &results, &items);
        assert!(errors.is_empty());
        assert_eq!(compact[0].generic_count, 2);
        assert_eq!(compact[0].joined_product_names, "가정 | 나정");
        assert_eq!(compact[1].joined_product_names, "");

        // drop one item row → mismatch is reported, not hidden
        let (_, errors) = build_compact_summaries(&rows, &results, &items[..1]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Row 1:"));
    }

    #[test]
    fn test_validate_results() {
        let bad = ResultRecord {
            sequence: Sequence::Number(5),
            not_found: true,
            generic_count: 1,
            total_count: 1,
            ..Default::default()
        };
        assert_eq!(validate_results(&[bad]).len(), 1);
        assert!(validate_results(&[ResultRecord::default()]).is_empty());
    }

    #[test]
    fn test_validation_messages_deduplicated() {
        // duplicate sequence 7 repeats the same message from both checks
        let bad = ResultRecord {
            sequence: Sequence::Number(7),
            generic_count: 3,
            total_count: 1,
            ..Default::default()
        };
        let rows = vec![record(7, "A"), record(7, "A")];
        let results = vec![bad.clone(), bad];

        let (_, compact_errors) = build_compact_summaries(&rows, &results, &[]);
        assert_eq!(compact_errors.len(), 1);
        assert_eq!(validate_results(&results).len(), 2);

        let merged = merge_messages(compact_errors.clone(), validate_results(&results));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], compact_errors[0]);
        assert!(merged[1].contains("exceeds total count"));

        let again = merge_messages(merged.clone(), merged.clone());
        assert_eq!(again, merged);
    }
}
