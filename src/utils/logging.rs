use tracing_subscriber::EnvFilter;

/// Initialize tracing for the crate at the given level ("warn", "debug", ...).
///
/// `RUST_LOG` overrides the level if set.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cartpole_lqr={level}")));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
