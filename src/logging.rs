use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "class_wizard=info";

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
