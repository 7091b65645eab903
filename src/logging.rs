use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber writing to stderr. `RUST_LOG` wins over
/// `level` when set.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| eyre!("invalid log level {level:?}: {e}"))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
