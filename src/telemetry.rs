//! Structured logging setup.

use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Installs a `tracing_subscriber::fmt` layer with an `EnvFilter` driven by
/// `RUST_LOG` (default `info`) and a `tracing-error` layer so diagnostic
/// error chains carry span-trace context. Safe to call more than once —
/// only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(atty_is_terminal()))
            .with(ErrorLayer::default())
            .try_init();
    });
}

fn atty_is_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
