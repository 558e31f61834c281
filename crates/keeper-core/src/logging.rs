//! Tracing subscriber initialization.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` when set, defaulting to info-level output for the
/// keeper crates. Safe to call once per process; embedders that install
/// their own subscriber should skip this.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keeper_core=info,keeper_panes=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
