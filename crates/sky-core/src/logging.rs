use eyre::Result as EyreResult;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, EnvFilter};

/// Installs a global `tracing` subscriber filtered by `RUST_LOG`, falling
/// back to `directives` when it's unset or empty.
///
/// A binary embedding this crate calls this once at startup; the crate
/// itself never installs a subscriber implicitly, since a library composed
/// into someone else's process doesn't get to claim the global default.
pub fn init_tracing(directives: &str) -> EyreResult<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => EnvFilter::builder().parse(value)?,
        _ => EnvFilter::builder().parse(directives)?,
    };

    registry().with(filter).with(layer()).try_init()?;
    Ok(())
}
