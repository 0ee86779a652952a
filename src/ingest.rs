//! Source row ingestion
//!
//! Reads the first worksheet of a spreadsheet (xlsx/xlsm/xls/ods) or a JSON
//! array of records. Column roles are detected from the header row.

use crate::error::{DrugMatchError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use drugmatch_common::{Sequence, SourceRecord};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRole {
    Sequence,
    Product,
}

struct ColumnRule {
    role: ColumnRole,
    pattern: Regex,
    fallback: usize,
}

lazy_static! {
    static ref COLUMN_RULES: Vec<ColumnRule> = vec![
        ColumnRule {
            role: ColumnRole::Sequence,
            pattern: Regex::new(r"(?i)순번|seq|^\s*no\.?\s*$|number|#|index").unwrap(),
            fallback: 0,
        },
        ColumnRule {
            role: ColumnRole::Product,
            pattern: Regex::new(r"(?i)product|brand|name|제품|품목|english").unwrap(),
            fallback: 1,
        },
    ];
}

/// Column indexes of the two roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub sequence: Option<usize>,
    pub product: usize,
}

/// Detect roles from header cells; unmatched roles fall back to a fixed position.
pub fn detect_columns(headers: &[String]) -> ColumnMap {
    let width = headers.len().max(1);
    let mut sequence = None;
    let mut product = None;

    for rule in COLUMN_RULES.iter() {
        let found = headers
            .iter()
            .position(|h| rule.pattern.is_match(h))
            .unwrap_or(rule.fallback.min(width - 1));
        match rule.role {
            ColumnRole::Sequence => sequence = Some(found),
            ColumnRole::Product => product = Some(found),
        }
    }

    let product = product.unwrap_or(0);
    // a single column holds the product; sequence becomes the row number
    let sequence = sequence.filter(|&s| s != product);
    ColumnMap { sequence, product }
}

/// Build source records from header + data rows (cells already stringified).
pub fn rows_to_records(headers: &[String], rows: &[Vec<CellValue>]) -> Vec<SourceRecord> {
    let columns = detect_columns(headers);
    debug!(?columns, "detected columns");

    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let product_name = row
                .get(columns.product)
                .map(CellValue::text)
                .unwrap_or_default();
            if product_name.is_empty() {
                return None;
            }

            let sequence = columns
                .sequence
                .and_then(|c| row.get(c))
                .and_then(CellValue::sequence)
                .unwrap_or(Sequence::Number(index as i64 + 1));

            Some(SourceRecord {
                sequence,
                product_name,
            })
        })
        .collect()
}

/// Spreadsheet or JSON cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    fn text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.trim().to_string(),
        }
    }

    fn sequence(&self) -> Option<Sequence> {
        match self {
            CellValue::Empty => None,
            CellValue::Number(n) if n.fract() == 0.0 => Some(Sequence::Number(*n as i64)),
            CellValue::Number(n) => Some(Sequence::Text(n.to_string())),
            CellValue::Text(s) if s.trim().is_empty() => None,
            CellValue::Text(s) => Some(Sequence::Text(s.trim().to_string())),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// Load source rows from a spreadsheet or JSON file.
pub fn load_source_records(path: &Path) -> Result<Vec<SourceRecord>> {
    if !path.exists() {
        return Err(DrugMatchError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let records = match extension.as_str() {
        "json" => load_json(path)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => load_workbook(path)?,
        other => {
            return Err(DrugMatchError::Ingest(format!(
                "Unsupported file type: .{} (use xlsx, xls, ods or json)",
                other
            )))
        }
    };

    if records.is_empty() {
        return Err(DrugMatchError::NoSourceRows(path.display().to_string()));
    }
    Ok(records)
}

fn load_workbook(path: &Path) -> Result<Vec<SourceRecord>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DrugMatchError::Ingest("Workbook has no worksheets".into()))??;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| CellValue::from(c).text()).collect(),
        None => return Ok(Vec::new()),
    };
    let data: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(CellValue::from).collect())
        .collect();

    Ok(rows_to_records(&headers, &data))
}

/// JSON array of objects; keys play the role of header cells.
fn load_json(path: &Path) -> Result<Vec<SourceRecord>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Array(items) = value else {
        return Err(DrugMatchError::Ingest("Expected a JSON array of rows".into()));
    };

    let mut headers: Vec<String> = Vec::new();
    for item in &items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }

    let rows: Vec<Vec<CellValue>> = items
        .iter()
        .map(|item| {
            headers
                .iter()
                .map(|h| item.get(h).map(CellValue::from).unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    Ok(rows_to_records(&headers, &rows))
}
