use clap::{Args, Parser, Subcommand};
use drugmatch_common::CountMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "drugmatch")]
#[command(about = "Drug product → ingredient → domestic registry generic counts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging (DRUGMATCH_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Matching options shared by `run` and `rematch`
#[derive(Args, Clone, Debug)]
pub struct MatchArgs {
    /// Output workbook (default: next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write the full report as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Counting key (ingredient / ingredient+form)
    #[arg(short = 'm', long, default_value = "ingredient")]
    pub count_mode: CountMode,

    /// Count revoked/cancelled products too
    #[arg(long)]
    pub include_revoked: bool,

    /// Reuse and update the lookup cache file next to the input
    #[arg(long)]
    pub use_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full pipeline: ingest, enrich, match, count, export
    Run {
        /// Source spreadsheet (xlsx/xls/ods) or JSON rows
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        options: MatchArgs,
    },

    /// Primary registry enrichment only; writes enrichment JSON
    Enrich {
        /// Source spreadsheet (xlsx/xls/ods) or JSON rows
        #[arg(required = true)]
        input: PathBuf,

        /// Output JSON (default: input folder/enrichment.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Reuse and update the lookup cache file next to the input
        #[arg(long)]
        use_cache: bool,
    },

    /// Re-run matching on an (edited) enrichment JSON
    Rematch {
        /// Enrichment JSON from `enrich` or `map`
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        options: MatchArgs,
    },

    /// Fill missing local ingredient names
    Map {
        /// Enrichment JSON
        #[arg(required = true)]
        input: PathBuf,

        /// Output file (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Non-interactive: JSON table { "sequence or ingredient base": "local name" }
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Show or edit settings
    Config {
        /// Set the MFDS service key
        #[arg(long)]
        set_service_key: Option<String>,

        /// Set the openFDA API key
        #[arg(long)]
        set_openfda_key: Option<String>,

        /// Show settings
        #[arg(long)]
        show: bool,
    },

    /// Lookup cache management
    Cache {
        /// Delete the cache file
        #[arg(long)]
        clear: bool,

        /// Target folder (default: current)
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// Show cache info
        #[arg(long)]
        info: bool,
    },
}
