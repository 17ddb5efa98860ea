use tracing_subscriber::{EnvFilter, fmt};

/// `verbose` lowers the fallback level to debug when RUST_LOG is unset.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else {
        crate::utils::consts::LOG_LEVEL
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_writer(std::io::stdout)
        .init();
}
