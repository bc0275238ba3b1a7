use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "HRIS_NORMALIZE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "hris_normalize=info,sqlx=warn";

fn env_filter() -> EnvFilter {
    let directives = std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs JSON logging on stderr. Stdout stays reserved for progress text.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .json()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}
