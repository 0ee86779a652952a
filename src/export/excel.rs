//! Excel workbook export (rust_xlsxwriter)
//!
//! Sheets: filled, enrichment, generic_items, generic_list_compact, summary

use crate::error::Result;
use crate::pipeline::RunReport;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

enum Cell {
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

fn yes_no(value: bool) -> Cell {
    Cell::from(if value { "Y" } else { "N" })
}

fn write_table(
    worksheet: &mut Worksheet,
    header_format: &Format,
    headers: &[&str],
    rows: Vec<Vec<Cell>>,
) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, header_format)?;
    }

    for (index, row) in rows.into_iter().enumerate() {
        let row_num = index as u32 + 1;
        for (col, cell) in row.into_iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    worksheet.write_string(row_num, col as u16, text)?;
                }
                Cell::Number(number) => {
                    worksheet.write_number(row_num, col as u16, number)?;
                }
            }
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    worksheet.autofit();
    Ok(())
}

pub fn generate_excel(report: &RunReport, output_path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let filled = workbook.add_worksheet().set_name("filled")?;
    write_table(
        filled,
        &header_format,
        &[
            "sequence", "product", "product_norm", "ingredient_base", "local_ingredient",
            "local_search_term", "local_name_mapped", "confidence", "original_registered",
            "generic_count_excluding_original", "total_count_including_original", "not_found",
        ],
        report
            .results
            .iter()
            .map(|r| -> Vec<Cell> {
                vec![
                    r.sequence.to_string().into(),
                    r.product_name.as_str().into(),
                    r.normalized_name.as_str().into(),
                    r.ingredient_base.as_str().into(),
                    r.local_ingredient_name.as_str().into(),
                    r.local_search_term.as_str().into(),
                    yes_no(r.local_name_mapped),
                    r.confidence.as_str().into(),
                    r.has_original.as_str().into(),
                    r.generic_count.into(),
                    r.total_count.into(),
                    yes_no(r.not_found),
                ]
            })
            .collect(),
    )?;

    let enrichment = workbook.add_worksheet().set_name("enrichment")?;
    write_table(
        enrichment,
        &header_format,
        &[
            "sequence", "product", "product_norm", "brand_name", "generic_name",
            "application_number", "active_ingredients_raw", "ingredient_base", "confidence",
            "local_ingredient", "local_search_term", "local_name_mapped",
        ],
        report
            .enrichment
            .iter()
            .map(|e| -> Vec<Cell> {
                vec![
                    e.sequence.to_string().into(),
                    e.product_name.as_str().into(),
                    e.normalized_name.as_str().into(),
                    e.primary_brand_name.as_str().into(),
                    e.primary_generic_name.as_str().into(),
                    e.application_number.as_str().into(),
                    e.raw_active_ingredients.as_str().into(),
                    e.ingredient_base.as_str().into(),
                    e.confidence.as_str().into(),
                    e.local_ingredient_name.as_str().into(),
                    e.local_search_term.as_str().into(),
                    yes_no(e.local_name_mapped),
                ]
            })
            .collect(),
    )?;

    let items = workbook.add_worksheet().set_name("generic_items")?;
    write_table(
        items,
        &header_format,
        &[
            "source_sequence", "source_product", "ingredient_base", "item_code", "product_name",
            "manufacturer", "dosage_form", "classification", "revoked",
        ],
        report
            .generic_items
            .iter()
            .map(|g| -> Vec<Cell> {
                vec![
                    g.source_sequence.to_string().into(),
                    g.source_product_name.as_str().into(),
                    g.ingredient_base.as_str().into(),
                    g.item_code.as_str().into(),
                    g.product_name.as_str().into(),
                    g.manufacturer.as_str().into(),
                    g.dosage_form.as_str().into(),
                    g.classification.as_str().into(),
                    yes_no(g.is_revoked),
                ]
            })
            .collect(),
    )?;

    let compact = workbook.add_worksheet().set_name("generic_list_compact")?;
    write_table(
        compact,
        &header_format,
        &["sequence", "product", "ingredient_base", "generic_count", "joined_product_names"],
        report
            .compact_summaries
            .iter()
            .map(|c| -> Vec<Cell> {
                vec![
                    c.sequence.to_string().into(),
                    c.product_name.as_str().into(),
                    c.ingredient_base.as_str().into(),
                    c.generic_count.into(),
                    c.joined_product_names.as_str().into(),
                ]
            })
            .collect(),
    )?;

    let s = &report.summary;
    let mut summary_rows: Vec<Vec<Cell>> = vec![
        vec!["run_id".into(), report.run_id.as_str().into()],
        vec!["count_mode".into(), report.options.count_mode.to_string().into()],
        vec!["include_revoked".into(), yes_no(report.options.include_revoked)],
        vec!["total_rows".into(), s.total_rows.into()],
        vec!["review_count".into(), s.review_count.into()],
        vec!["not_found_count".into(), s.not_found_count.into()],
        vec!["confidence_high".into(), s.confidence_high.into()],
        vec!["confidence_medium".into(), s.confidence_medium.into()],
        vec!["confidence_review".into(), s.confidence_review.into()],
        vec!["unmapped_count".into(), s.unmapped_count.into()],
        vec!["total_generic_item_rows".into(), s.total_generic_item_rows.into()],
        vec!["average_generic_per_source".into(), s.average_generic_per_source.into()],
        vec!["validation_error_count".into(), s.validation_errors.len().into()],
    ];
    summary_rows.extend(
        s.validation_errors
            .iter()
            .map(|e| -> Vec<Cell> { vec!["validation_error".into(), e.as_str().into()] }),
    );

    let summary = workbook.add_worksheet().set_name("summary")?;
    write_table(summary, &header_format, &["metric", "value"], summary_rows)?;

    workbook.save(output_path)?;
    Ok(())
}
