use drugmatch_common::{
    Confidence, EnrichmentRecord, GenericItemRecord, ResultRecord, SummaryMetrics,
};

/// Aggregate metrics over a finished run
pub fn summarize(
    enrichment: &[EnrichmentRecord],
    results: &[ResultRecord],
    generic_items: &[GenericItemRecord],
    validation_errors: &[String],
) -> SummaryMetrics {
    let count = |confidence: Confidence| {
        enrichment
            .iter()
            .filter(|r| r.confidence == confidence)
            .count()
    };

    let total_rows = enrichment.len();
    let confidence_review = count(Confidence::Review);
    let average = if results.is_empty() {
        0.0
    } else {
        let total: usize = results.iter().map(|r| r.generic_count).sum();
        round2(total as f64 / results.len() as f64)
    };

    SummaryMetrics {
        total_rows,
        review_count: confidence_review,
        not_found_count: results.iter().filter(|r| r.not_found).count(),
        confidence_high: count(Confidence::High),
        confidence_medium: count(Confidence::Medium),
        confidence_review,
        unmapped_count: enrichment.iter().filter(|r| r.needs_manual_mapping()).count(),
        total_generic_item_rows: generic_items.len(),
        average_generic_per_source: average,
        validation_errors: validation_errors.to_vec(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
