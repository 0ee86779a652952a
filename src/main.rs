use clap::Parser;
use drugmatch::cache::{CacheFile, RegistryCache};
use drugmatch::cli::{Cli, Commands, MatchArgs};
use drugmatch::config::Config;
use drugmatch::error::Result;
use drugmatch::progress::BarProgress;
use drugmatch::registry::HttpTransport;
use drugmatch::{export, ingest, logging, mapping};
use drugmatch::{Pipeline, RunOptions, RunOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pipeline wired to the real registries, with Ctrl-C cancelling the run.
fn build_pipeline(config: &Config, cache: Arc<RegistryCache>) -> Result<Arc<Pipeline>> {
    let settings = config.settings()?;
    let dictionary = Arc::new(config.load_dictionary()?);
    let transport = Arc::new(HttpTransport::new(settings.timeout)?);
    let pipeline = Arc::new(Pipeline::new(settings, transport, dictionary, cache));

    let handle = pipeline.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            handle.cancel();
        }
    });

    Ok(pipeline)
}

fn load_cache(folder: &Path, use_cache: bool) -> Arc<RegistryCache> {
    let cache = Arc::new(RegistryCache::new());
    if use_cache {
        let file = CacheFile::load(folder);
        println!("- Cache: {} entries loaded", file.len());
        file.restore_into(&cache);
    }
    cache
}

fn save_cache(folder: &Path, cache: &RegistryCache, use_cache: bool) -> Result<()> {
    if use_cache {
        let file = CacheFile::from_cache(cache);
        file.save(folder)?;
        println!("- Cache: {} entries saved", file.len());
    }
    Ok(())
}

fn folder_of(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn export_outcome(outcome: RunOutcome, input: &Path, options: &MatchArgs, progress: &BarProgress) -> Result<()> {
    let report = match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::Cancelled => {
            progress.abandon("Cancelled");
            println!("\nRun cancelled; nothing was written.");
            return Ok(());
        }
    };
    progress.finish("Done");

    let s = &report.summary;
    println!("\nSummary:");
    println!("  Rows: {}", s.total_rows);
    println!(
        "  Confidence: HIGH {} / MEDIUM {} / REVIEW {}",
        s.confidence_high, s.confidence_medium, s.confidence_review
    );
    println!("  Not found in registry: {}", s.not_found_count);
    println!("  Without local name: {}", s.unmapped_count);
    println!("  Generic item rows: {}", s.total_generic_item_rows);
    println!("  Average generics per row: {:.2}", s.average_generic_per_source);
    for error in &s.validation_errors {
        println!("  ⚠ {}", error);
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| format!("{}_filled", s))
        .unwrap_or_else(|| "drugmatch_filled".into());
    let excel_path = export::output_path_for(
        options.output.as_deref().unwrap_or(&folder_of(input)),
        &stem,
        "xlsx",
    );

    export::export_report(&report, &excel_path, options.json.as_deref())?;
    println!("\n✔ Workbook saved: {}", excel_path.display());
    if let Some(json) = &options.json {
        println!("✔ Report saved: {}", json.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Run { input, options } => {
            println!("drugmatch - run\n");

            println!("[1/3] Reading source rows...");
            let rows = ingest::load_source_records(&input)?;
            println!("✔ {} rows\n", rows.len());

            let folder = folder_of(&input);
            let cache = load_cache(&folder, options.use_cache);
            let pipeline = build_pipeline(&config, cache.clone())?;

            println!("[2/3] Querying registries...");
            let progress = BarProgress::new();
            let run_options = RunOptions {
                count_mode: options.count_mode,
                include_revoked: options.include_revoked,
            };
            let outcome = pipeline.run(rows, run_options, &progress).await?;
            save_cache(&folder, &cache, options.use_cache)?;

            println!("[3/3] Exporting...");
            export_outcome(outcome, &input, &options, &progress)?;
        }

        Commands::Enrich { input, output, use_cache } => {
            println!("drugmatch - enrich\n");

            let rows = ingest::load_source_records(&input)?;
            println!("✔ {} rows\n", rows.len());

            let folder = folder_of(&input);
            let cache = load_cache(&folder, use_cache);
            let pipeline = build_pipeline(&config, cache.clone())?;

            let progress = BarProgress::new();
            let enrichment = pipeline.enrich(rows, &progress).await?;
            save_cache(&folder, &cache, use_cache)?;

            match enrichment {
                Some(records) => {
                    progress.finish("Done");
                    let output = output.unwrap_or_else(|| folder.join("enrichment.json"));
                    export::write_enrichment(&records, &output)?;
                    let unmapped = mapping::unmapped_indices(&records).len();
                    println!("\n✔ Enrichment saved: {}", output.display());
                    if unmapped > 0 {
                        println!(
                            "  {} rows without a local name; run `drugmatch map {}`",
                            unmapped,
                            output.display()
                        );
                    }
                }
                None => {
                    progress.abandon("Cancelled");
                    println!("\nRun cancelled; nothing was written.");
                }
            }
        }

        Commands::Rematch { input, options } => {
            println!("drugmatch - rematch\n");

            let enrichment = export::read_enrichment(&input)?;
            println!("✔ {} enrichment rows\n", enrichment.len());

            let folder = folder_of(&input);
            let cache = load_cache(&folder, options.use_cache);
            let pipeline = build_pipeline(&config, cache.clone())?;

            let progress = BarProgress::new();
            let run_options = RunOptions {
                count_mode: options.count_mode,
                include_revoked: options.include_revoked,
            };
            let outcome = pipeline.rematch(enrichment, run_options, &progress).await?;
            save_cache(&folder, &cache, options.use_cache)?;

            export_outcome(outcome, &input, &options, &progress)?;
        }

        Commands::Map { input, output, from } => {
            println!("drugmatch - manual mapping\n");
            match from {
                Some(table) => {
                    let mut records = export::read_enrichment(&input)?;
                    let changed = mapping::apply_mapping_file(&mut records, &table)?;
                    let output = output.unwrap_or_else(|| input.clone());
                    export::write_enrichment(&records, &output)?;
                    println!("✔ {} rows mapped, saved: {}", changed, output.display());
                }
                None => mapping::run_interactive_mapping(&input, output.as_deref())?,
            }
        }

        Commands::Config { set_service_key, set_openfda_key, show } => {
            let mut config = config;

            if let Some(key) = set_service_key {
                config.set_service_key(key)?;
                println!("✔ MFDS service key saved");
            }

            if let Some(key) = set_openfda_key {
                config.set_openfda_key(key)?;
                println!("✔ openFDA API key saved");
            }

            if show {
                println!("Settings ({}):", Config::config_path()?.display());
                println!(
                    "  MFDS service key: {}",
                    if config.get_service_key().is_ok() { "set" } else { "not set" }
                );
                println!(
                    "  openFDA API key: {}",
                    if config.get_openfda_key().is_some() { "set" } else { "not set" }
                );
                println!("  openFDA: {}", config.openfda_base_url);
                println!("  MFDS detail: {}", config.mfds_detail_url);
                println!("  MFDS list: {}", config.mfds_list_url);
                println!(
                    "  Batch: {} rows / {} ms",
                    config.enrich_batch_size, config.enrich_batch_delay_ms
                );
                println!(
                    "  Retries: {} (openFDA {} ms, MFDS {} ms backoff)",
                    config.retry_attempts, config.openfda_backoff_ms, config.mfds_backoff_ms
                );
                println!("  Pages: {} x {}", config.max_pages, config.page_size);
                if let Some(path) = &config.dictionary_path {
                    println!("  Dictionary overlay: {}", path.display());
                }
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = CacheFile::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = CacheFile::load(&target);
                    println!("Cache:");
                    println!("  Path: {}", cache_path.display());
                    println!("  Enrichment entries: {}", cache.enrichment_len());
                    println!("  Product entries: {}", cache.product_len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  Size: {} bytes", meta.len());
                    }
                } else {
                    println!("No cache file: {}", cache_path.display());
                }
            }

            if clear {
                match CacheFile::clear(&target) {
                    Ok(true) => println!("✔ Cache deleted: {}", cache_path.display()),
                    Ok(false) => println!("No cache file"),
                    Err(e) => println!("Cache delete failed: {}", e),
                }
            }
        }
    }

    Ok(())
}
