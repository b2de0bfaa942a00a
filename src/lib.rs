//! Zstandard content encoding for the tako response compression pipeline.
//!
//! The crate provides the `zstd` encoding module: its configuration ([`encode::zstd::Zstd`]),
//! parsed from JSON or from `zstd [<level>] [<window_size>]` directives, the provisioning
//! step that fills in defaults, and a factory producing one streaming encoder per
//! response.
//!
//! # Examples
//!
//! ```rust
//! use tako_zstd::config::load_directives;
//! use tako_zstd::encode::Encoding;
//!
//! tako_zstd::register()?;
//! let encoders = load_directives("Takofile", "encode {\n  zstd best 256KiB\n}")?;
//! assert_eq!(encoders[0].accept_encoding(), "zstd");
//! ```

use once_cell::sync::OnceCell;

pub mod body;
pub mod config;
pub mod directive;
pub mod encode;
pub mod error;
pub mod registry;
pub mod size;
pub mod stream;
pub mod types;

#[cfg(feature = "tako-tracing")]
pub mod tracing;

pub use encode::zstd::{EncoderLevel, Zstd, ZstdBuilder};
pub use error::EncodeError;
pub use stream::stream_encode;

static REGISTERED: OnceCell<()> = OnceCell::new();

/// Registers the modules of this crate with the global registry.
///
/// Call once during startup, before loading any configuration that references the
/// `zstd` encoding. Repeated calls are no-ops.
pub fn register() -> Result<(), EncodeError> {
    REGISTERED
        .get_or_try_init(|| registry::register_module(encode::zstd::Zstd::module_info()))
        .map(|_| ())
}
