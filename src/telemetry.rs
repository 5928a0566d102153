// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "announcement_ingest=info,warn";

/// Install the global subscriber for a binary. `RUST_LOG` overrides the
/// filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json().with_target(false)).try_init()
    } else {
        registry.with(fmt::layer().compact().with_target(false)).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}
