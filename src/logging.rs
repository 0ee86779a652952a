use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DRUGMATCH_LOG";

/// Install the stderr subscriber. `DRUGMATCH_LOG` overrides the default filter.
pub fn init(verbose: bool) {
    let default = if verbose {
        "drugmatch=debug,drugmatch_common=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
