use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(env_filter).compact().try_init();
}
