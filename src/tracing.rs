//! Optional tracing subscriber setup.
//!
//! Formats events with file names, line numbers and levels, and reports span closes.
//! Only available with the `tako-tracing` feature.

use tracing_subscriber::{
    Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

pub use tracing::level_filters::LevelFilter;

/// Installs the global tracing subscriber, filtering events below `level`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(level: LevelFilter) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .with_filter(level),
        )
        .try_init()
}
