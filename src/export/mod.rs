pub mod excel;

use crate::error::{DrugMatchError, Result};
use crate::pipeline::RunReport;
use drugmatch_common::EnrichmentRecord;
use std::path::{Path, PathBuf};

pub use excel::generate_excel;

/// Output file for `extension`: a directory (or extension-less path) gets
/// `{stem}.{extension}` inside it.
pub fn output_path_for(output: &Path, stem: &str, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", stem, extension))
    } else {
        output.to_path_buf()
    }
}

pub fn write_json_report(report: &RunReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(output_path, json)?;
    Ok(())
}

pub fn write_enrichment(records: &[EnrichmentRecord], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(output_path, json)?;
    Ok(())
}

pub fn read_enrichment(input: &Path) -> Result<Vec<EnrichmentRecord>> {
    if !input.exists() {
        return Err(DrugMatchError::FileNotFound(input.display().to_string()));
    }
    let content = std::fs::read_to_string(input)?;
    let records: Vec<EnrichmentRecord> = serde_json::from_str(&content)?;
    Ok(records)
}

/// Workbook and optional JSON report for a finished run.
pub fn export_report(report: &RunReport, excel_path: &Path, json_path: Option<&Path>) -> Result<()> {
    if let Some(parent) = excel_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            return Err(DrugMatchError::Export(format!(
                "Output folder does not exist: {}",
                parent.display()
            )));
        }
    }

    generate_excel(report, excel_path)?;
    if let Some(json_path) = json_path {
        write_json_report(report, json_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("out/result.xlsx"), "drugmatch", "xlsx"),
            PathBuf::from("out/result.xlsx")
        );
        assert_eq!(
            output_path_for(Path::new("out"), "drugmatch", "xlsx"),
            PathBuf::from("out/drugmatch.xlsx")
        );
    }
}
