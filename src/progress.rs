//! Run progress reporting
//!
//! Each stage owns a fixed slice of the 0–100 scale:
//! upload 2, enrichment 10–50 (52 when finished), matching 52–96, done 100.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uploading,
    Enriching,
    Matching,
    Calculating,
    Done,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Uploading => "upload",
            Stage::Enriching => "enrich",
            Stage::Matching => "match",
            Stage::Calculating => "calculate",
            Stage::Done => "done",
        }
    }
}

/// Overall percentage for `current` of `total` units inside `stage`.
pub fn overall_percent(stage: Stage, current: usize, total: usize) -> u8 {
    let fraction = if total == 0 {
        1.0
    } else {
        current.min(total) as f64 / total as f64
    };

    match stage {
        Stage::Uploading => 2,
        Stage::Enriching => 10 + (fraction * 40.0).round() as u8,
        Stage::Matching => 52 + (fraction * 44.0).round() as u8,
        Stage::Calculating => 96,
        Stage::Done => 100,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub current: usize,
    pub total: usize,
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: Stage, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            stage,
            current,
            total,
            percent: overall_percent(stage, current, total),
            message: message.into(),
        }
    }
}

/// Receiver of progress updates
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

/// Discards every update
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {prefix:.bold.dim} {wide_msg}";

/// Terminal progress bar on the 0–100 scale
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, update: &ProgressUpdate) {
        self.bar.set_position(update.percent as u64);
        self.bar.set_prefix(update.stage.label());
        self.bar.set_message(update.message.clone());
    }
}
