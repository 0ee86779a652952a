//! Manual local-name mapping
//!
//! Rows whose ingredient could not be translated get an explicit search term,
//! either interactively or from a JSON file, before `rematch`.

use crate::error::{DrugMatchError, Result};
use dialoguer::Input;
use drugmatch_common::EnrichmentRecord;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Indexes of rows without a local ingredient name
pub fn unmapped_indices(records: &[EnrichmentRecord]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.needs_manual_mapping())
        .map(|(i, _)| i)
        .collect()
}

/// Local names already in use (deduplicated, first-seen order)
pub fn collect_local_names(records: &[EnrichmentRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.local_ingredient_name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Apply `local_name` to row `index` and every other unmapped row with the
/// same ingredient base. Returns the number of rows changed.
pub fn apply_to_base(records: &mut [EnrichmentRecord], index: usize, local_name: &str) -> usize {
    let Some(base) = records.get(index).map(|r| r.ingredient_base.clone()) else {
        return 0;
    };

    let mut changed = 0;
    for (i, record) in records.iter_mut().enumerate() {
        let same_base = i == index || (record.needs_manual_mapping() && record.ingredient_base == base);
        if same_base && record.apply_manual_mapping(local_name) {
            changed += 1;
        }
    }
    changed
}

/// Apply a `{ key: local name }` table where a key is a row sequence or an
/// ingredient base. Sequence keys win. Returns the number of rows changed.
pub fn apply_mapping_table(
    records: &mut [EnrichmentRecord],
    table: &HashMap<String, String>,
) -> usize {
    let mut changed = 0;
    for record in records.iter_mut() {
        let name = table
            .get(&record.sequence.to_string())
            .or_else(|| table.get(&record.ingredient_base))
            .cloned();
        if let Some(name) = name {
            if record.apply_manual_mapping(&name) {
                changed += 1;
            }
        }
    }
    changed
}

pub fn apply_mapping_file(records: &mut [EnrichmentRecord], path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(DrugMatchError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let table: HashMap<String, String> = serde_json::from_str(&content)?;
    Ok(apply_mapping_table(records, &table))
}

pub enum MappingAction {
    Input(String),
    Skip,
    SkipAll,
    Quit,
}

/// Interactive mapping over an enrichment JSON file
pub fn run_interactive_mapping(input_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(input_path)?;
    let mut records: Vec<EnrichmentRecord> = serde_json::from_str(&content)?;

    let pending = unmapped_indices(&records);
    if pending.is_empty() {
        println!("✓ Every row has a local ingredient name");
        return Ok(());
    }

    println!("Rows without a local ingredient name: {}", pending.len());
    println!("---");
    println!("Actions: type a name | [Enter]/s skip | S skip all | q save and quit");
    println!("---\n");

    let known = collect_local_names(&records);
    for (count, &idx) in pending.iter().enumerate() {
        // an earlier answer for the same base may have filled this row
        if !records[idx].needs_manual_mapping() {
            continue;
        }

        let record = &records[idx];
        println!(
            "[{}/{}] {} → {} ({})",
            count + 1,
            pending.len(),
            record.product_name,
            record.ingredient_base,
            record.confidence
        );

        match prompt_mapping_action(&known)? {
            MappingAction::Input(name) => {
                let changed = apply_to_base(&mut records, idx, &name);
                println!("  → {} ({} rows)\n", name, changed);
            }
            MappingAction::Skip => println!("  → skipped\n"),
            MappingAction::SkipAll => {
                println!("  → skipping the rest\n");
                break;
            }
            MappingAction::Quit => {
                println!("Saving and quitting...");
                break;
            }
        }
    }

    let output = output_path.unwrap_or(input_path);
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(output, json)?;
    println!("\n✓ Saved: {}", output.display());

    Ok(())
}

fn prompt_mapping_action(candidates: &[String]) -> Result<MappingAction> {
    if !candidates.is_empty() {
        println!("  Known names: {}", candidates.join(", "));
    }

    let input: String = Input::new()
        .with_prompt("Local ingredient name")
        .allow_empty(true)
        .interact_text()
        .map_err(|e| DrugMatchError::InvalidInput(e.to_string()))?;

    let trimmed = input.trim();
    match trimmed {
        "" | "s" => Ok(MappingAction::Skip),
        "S" => Ok(MappingAction::SkipAll),
        "q" | "Q" => Ok(MappingAction::Quit),
        _ => Ok(MappingAction::Input(trimmed.to_string())),
    }
}
