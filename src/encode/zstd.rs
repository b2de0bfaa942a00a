//! Zstandard content encoding.
//!
//! [`Zstd`] holds the user-facing configuration (compression level tier and window
//! size), populated either from structured JSON or from a `zstd [<level>] [<window>]`
//! directive, then provisioned once. Provisioning caps the window at 128 KiB unless the
//! user configured one: the library default of 8 MiB is too much memory for many
//! decoding clients. A window of `0` keeps the library's own choice.
//!
//! # Examples
//!
//! ```rust
//! use tako_zstd::encode::Provisioner;
//! use tako_zstd::encode::zstd::{EncoderLevel, ZstdBuilder};
//! use std::io::Write;
//!
//! let mut zstd = ZstdBuilder::new()
//!     .level(EncoderLevel::BetterCompression)
//!     .build();
//! zstd.provision()?;
//!
//! let mut encoder = zstd.build_encoder(Vec::<u8>::new())?;
//! encoder.write_all(b"hello, world")?;
//! let compressed = encoder.finish()?;
//! ```

use std::{
    fmt,
    io::{self, Write},
    str::FromStr,
};

use ::zstd::stream::{raw::CParameter, write::Encoder as ZstdWriter};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Unexpected, Visitor},
};
use tracing::{debug, trace};

use crate::{
    directive::Dispenser,
    encode::{Encoder, Encoding, EncodingModule, Provisioner, Sink, UnmarshalDirective},
    error::EncodeError,
    registry::ModuleInfo,
    size::parse_bytes,
};

/// Registry id of the zstd encoding module.
pub const MODULE_ID: &str = "http.encoders.zstd";

/// Window size applied when none is configured.
pub const DEFAULT_WINDOW_SIZE: u64 = 128 << 10;
/// Smallest explicit window the encoder accepts.
pub const MIN_WINDOW_SIZE: u64 = 1 << 10;
/// Largest explicit window the encoder accepts.
pub const MAX_WINDOW_SIZE: u64 = 1 << 29;

/// Compression speed/ratio tier.
///
/// `NotSet` is the zero value and selects the library default level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EncoderLevel {
    #[default]
    NotSet,
    Fastest,
    Default,
    BetterCompression,
    BestCompression,
}

impl EncoderLevel {
    /// All selectable tiers, fastest first.
    pub const ALL: [EncoderLevel; 4] = [
        EncoderLevel::Fastest,
        EncoderLevel::Default,
        EncoderLevel::BetterCompression,
        EncoderLevel::BestCompression,
    ];

    /// Canonical literal of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderLevel::NotSet => "unset",
            EncoderLevel::Fastest => "fastest",
            EncoderLevel::Default => "default",
            EncoderLevel::BetterCompression => "better",
            EncoderLevel::BestCompression => "best",
        }
    }

    /// Quoted list of the accepted literals, for error messages.
    pub fn accepted_literals() -> &'static str {
        "'fastest', 'default', 'better', 'best'"
    }

    pub fn is_unset(&self) -> bool {
        *self == EncoderLevel::NotSet
    }

    /// Numeric zstd level for the tier. `0` lets the library pick its default.
    pub fn zstd_level(&self) -> i32 {
        match self {
            EncoderLevel::NotSet => 0,
            EncoderLevel::Fastest => 1,
            EncoderLevel::Default => 3,
            EncoderLevel::BetterCompression => 7,
            EncoderLevel::BestCompression => 11,
        }
    }

    /// Maps the numeric tiers used by structured configs (0 = unset, 1..=4).
    pub fn from_tier(tier: u64) -> Option<Self> {
        match tier {
            0 => Some(EncoderLevel::NotSet),
            1..=4 => Some(Self::ALL[tier as usize - 1]),
            _ => None,
        }
    }
}

impl fmt::Display for EncoderLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncoderLevel {
    type Err = EncodeError;

    /// Parses a level literal, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastest" => Ok(EncoderLevel::Fastest),
            "default" => Ok(EncoderLevel::Default),
            "better" | "better-compression" => Ok(EncoderLevel::BetterCompression),
            "best" | "best-compression" => Ok(EncoderLevel::BestCompression),
            _ => Err(EncodeError::InvalidLevel(s.to_string())),
        }
    }
}

impl Serialize for EncoderLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EncoderLevel::NotSet => serializer.serialize_u8(0),
            level => serializer.serialize_str(level.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for EncoderLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl Visitor<'_> for LevelVisitor {
            type Value = EncoderLevel;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    f,
                    "one of {} or a tier number from 0 to 4",
                    EncoderLevel::accepted_literals()
                )
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                EncoderLevel::from_tier(v)
                    .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .ok()
                    .and_then(EncoderLevel::from_tier)
                    .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(LevelVisitor)
    }
}

/// Zstandard encoding configuration.
///
/// `window_size` distinguishes three states: `None` (not configured, provisioning
/// fills in [`DEFAULT_WINDOW_SIZE`]), `Some(0)` (use the library default window) and
/// `Some(n)` (explicit override).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Zstd {
    #[serde(default, skip_serializing_if = "EncoderLevel::is_unset")]
    pub level: EncoderLevel,
    #[serde(default)]
    pub window_size: Option<u64>,
}

/// Options an encoder was constructed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Worker count; responses are compressed on the calling thread.
    pub concurrency: usize,
    /// Empty input still yields a complete, empty frame.
    pub zero_frames: bool,
    pub level: EncoderLevel,
    /// Window override passed to the library, if any.
    pub window_size: Option<u64>,
}

impl Zstd {
    /// Registry entry for this module.
    pub fn module_info() -> ModuleInfo {
        ModuleInfo {
            id: MODULE_ID,
            new: || EncodingModule::Zstd(Zstd::default()),
        }
    }

    /// Options `build_encoder` applies for the current configuration.
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            concurrency: 1,
            zero_frames: true,
            level: self.level,
            window_size: self.window_size.filter(|w| *w > 0),
        }
    }

    /// Creates a new encoder compressing into `sink`.
    pub fn build_encoder<W: Write>(&self, sink: W) -> Result<ZstdEncoder<W>, EncodeError> {
        let options = self.encoder_options();
        let mut inner =
            ZstdWriter::new(sink, options.level.zstd_level()).map_err(EncodeError::Construct)?;
        if let Some(window) = options.window_size {
            inner
                .set_parameter(CParameter::WindowLog(window_log(window)?))
                .map_err(EncodeError::Construct)?;
        }
        trace!(level = %options.level, window_size = ?options.window_size, "zstd encoder created");
        Ok(ZstdEncoder { inner, options })
    }
}

/// Base-2 logarithm of a valid explicit window size.
fn window_log(window: u64) -> Result<u32, EncodeError> {
    if !window.is_power_of_two() || !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&window) {
        return Err(EncodeError::WindowOutOfRange(window));
    }
    Ok(window.trailing_zeros())
}

impl Encoding for Zstd {
    fn accept_encoding(&self) -> &'static str {
        "zstd"
    }

    fn new_encoder(&self, sink: Sink) -> Result<Box<dyn Encoder>, EncodeError> {
        Ok(Box::new(self.build_encoder(sink)?))
    }
}

impl Provisioner for Zstd {
    fn provision(&mut self) -> Result<(), EncodeError> {
        if self.window_size.is_none() {
            debug!(window_size = DEFAULT_WINDOW_SIZE, "applying default zstd window size");
            self.window_size = Some(DEFAULT_WINDOW_SIZE);
        }
        if let Some(window) = self.window_size.filter(|w| *w > 0) {
            window_log(window)?;
        }
        Ok(())
    }
}

impl UnmarshalDirective for Zstd {
    /// Parses `zstd [<level>] [<window_size>]`.
    fn unmarshal_directive(&mut self, d: &mut Dispenser) -> Result<(), EncodeError> {
        d.next(); // directive name
        if !d.next_arg() {
            return Ok(());
        }
        self.level = d.val().parse().map_err(|e| d.err(e))?;

        if !d.next_arg() {
            return Ok(());
        }
        let literal = d.val();
        let size = parse_bytes(literal).map_err(|source| {
            d.err(EncodeError::InvalidWindowSize {
                literal: literal.to_string(),
                source,
            })
        })?;
        self.window_size = Some(size);

        let ignored = d.remaining_args();
        if !ignored.is_empty() {
            debug!(?ignored, "ignoring extra zstd directive arguments");
        }
        Ok(())
    }
}

/// Streaming Zstandard compressor writing into `W`.
pub struct ZstdEncoder<W: Write> {
    inner: ZstdWriter<'static, W>,
    options: EncoderOptions,
}

impl<W: Write> ZstdEncoder<W> {
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Ends the frame and returns the sink.
    pub fn finish(self) -> io::Result<W> {
        self.inner.finish()
    }
}

impl<W: Write> Write for ZstdEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Encoder for ZstdEncoder<Sink> {
    fn finish(self: Box<Self>) -> io::Result<Sink> {
        let this = *self;
        this.inner.finish()
    }
}

/// Builder for a [`Zstd`] configuration.
///
/// The built value still has to be provisioned before encoders are created from it.
///
/// # Example
/// ```rust
/// use tako_zstd::encode::zstd::{EncoderLevel, ZstdBuilder};
///
/// let zstd = ZstdBuilder::new()
///     .level(EncoderLevel::Fastest)
///     .window_size(256 << 10)
///     .build();
/// ```
pub struct ZstdBuilder(Zstd);

impl ZstdBuilder {
    /// Creates a new builder with every option unset.
    pub fn new() -> Self {
        Self(Zstd::default())
    }

    /// Sets the compression level tier.
    pub fn level(mut self, level: EncoderLevel) -> Self {
        self.0.level = level;
        self
    }

    /// Sets the window size in bytes. `0` keeps the library default.
    pub fn window_size(mut self, bytes: u64) -> Self {
        self.0.window_size = Some(bytes);
        self
    }

    pub fn build(self) -> Zstd {
        self.0
    }
}

impl Default for ZstdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Zstd, EncodeError> {
        let mut zstd = Zstd::default();
        let mut d = Dispenser::tokenize("test", input);
        zstd.unmarshal_directive(&mut d)?;
        Ok(zstd)
    }

    fn compress(zstd: &Zstd, data: &[u8]) -> Vec<u8> {
        let mut encoder = zstd.build_encoder(Vec::<u8>::new()).unwrap();
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Window size advertised in a zstd frame header, if it carries a window descriptor.
    fn frame_window(frame: &[u8]) -> Option<u64> {
        assert_eq!(&frame[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
        if frame[4] & 0x20 != 0 {
            return None;
        }
        let descriptor = frame[5];
        let base = 1u64 << (10 + (descriptor >> 3));
        Some(base + (base / 8) * u64::from(descriptor & 0x07))
    }

    fn sample() -> Vec<u8> {
        (0..64 * 1024u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn every_level_literal_parses_and_defaults_window() {
        for level in EncoderLevel::ALL {
            let mut zstd = parse(&format!("zstd {}", level.as_str())).unwrap();
            zstd.provision().unwrap();
            assert_eq!(zstd.level, level);
            assert_eq!(zstd.window_size, Some(131_072));
        }
    }

    #[test]
    fn level_literals_ignore_case_and_accept_long_names() {
        assert_eq!(parse("zstd FASTEST").unwrap().level, EncoderLevel::Fastest);
        assert_eq!(
            parse("zstd better-compression").unwrap().level,
            EncoderLevel::BetterCompression
        );
        assert_eq!(
            parse("zstd Best-Compression").unwrap().level,
            EncoderLevel::BestCompression
        );
    }

    #[test]
    fn invalid_level_is_rejected_and_level_stays_unset() {
        for literal in ["fast", "11", "speedest", "best_compression"] {
            let mut zstd = Zstd::default();
            let mut d = Dispenser::tokenize("test", &format!("zstd {literal}"));
            let err = zstd.unmarshal_directive(&mut d).unwrap_err();
            assert!(matches!(err.root(), EncodeError::InvalidLevel(l) if l == literal));
            assert!(err.to_string().contains("'fastest', 'default', 'better', 'best'"));
            assert_eq!(zstd.level, EncoderLevel::NotSet);
            assert_eq!(zstd.window_size, None);
        }
    }

    #[test]
    fn explicit_window_sizes_are_kept() {
        for (literal, expected) in [("0", 0), ("64KiB", 65_536), ("1MiB", 1 << 20), ("128KB", 128_000)] {
            let zstd = parse(&format!("zstd default {literal}")).unwrap();
            assert_eq!(zstd.window_size, Some(expected));
        }
        let mut zstd = parse("zstd default 0").unwrap();
        zstd.provision().unwrap();
        assert_eq!(zstd.window_size, Some(0));
    }

    #[test]
    fn invalid_window_size_carries_parse_error() {
        let err = parse("zstd best lots").unwrap_err();
        match err.root() {
            EncodeError::InvalidWindowSize { literal, .. } => assert_eq!(literal, "lots"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("incorrect window size 'lots'"));
        assert!(err.to_string().starts_with("test:1 - "));
    }

    #[test]
    fn bare_directive_leaves_fields_unset() {
        let mut zstd = parse("zstd").unwrap();
        assert_eq!(zstd, Zstd::default());
        zstd.provision().unwrap();
        assert_eq!(zstd.level, EncoderLevel::NotSet);
        assert_eq!(zstd.window_size, Some(DEFAULT_WINDOW_SIZE));
    }

    #[test]
    fn best_compression_with_window() {
        let zstd = parse("zstd best-compression 256KiB").unwrap();
        assert_eq!(zstd.level, EncoderLevel::BestCompression);
        assert_eq!(zstd.window_size, Some(262_144));
    }

    #[test]
    fn trailing_arguments_are_ignored() {
        let zstd = parse("zstd fastest 64KiB extra tokens").unwrap();
        assert_eq!(zstd.level, EncoderLevel::Fastest);
        assert_eq!(zstd.window_size, Some(65_536));
    }

    #[test]
    fn provision_is_idempotent() {
        for initial in [None, Some(0), Some(1 << 20)] {
            let mut once = Zstd {
                level: EncoderLevel::Default,
                window_size: initial,
            };
            once.provision().unwrap();
            let mut twice = once.clone();
            twice.provision().unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn provision_rejects_unusable_windows() {
        for window in [1000, 512, 3 << 10, 1 << 30] {
            let mut zstd = Zstd {
                level: EncoderLevel::NotSet,
                window_size: Some(window),
            };
            assert!(matches!(
                zstd.provision(),
                Err(EncodeError::WindowOutOfRange(w)) if w == window
            ));
        }
    }

    #[test]
    fn zero_window_passes_no_override() {
        let zstd = Zstd {
            level: EncoderLevel::Fastest,
            window_size: Some(0),
        };
        let encoder = zstd.build_encoder(Vec::<u8>::new()).unwrap();
        assert_eq!(encoder.options().window_size, None);
        assert_eq!(encoder.options().concurrency, 1);
        assert!(encoder.options().zero_frames);

        let frame = compress(&zstd, &sample());
        assert!(frame_window(&frame).unwrap() > DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn positive_window_is_passed_through() {
        let mut zstd = Zstd::default();
        zstd.provision().unwrap();
        let encoder = zstd.build_encoder(Vec::<u8>::new()).unwrap();
        assert_eq!(encoder.options().window_size, Some(DEFAULT_WINDOW_SIZE));
        assert_eq!(frame_window(&compress(&zstd, &sample())), Some(DEFAULT_WINDOW_SIZE));

        let zstd = Zstd {
            level: EncoderLevel::BestCompression,
            window_size: Some(1 << 16),
        };
        assert_eq!(zstd.encoder_options().window_size, Some(1 << 16));
        assert_eq!(frame_window(&compress(&zstd, &sample())), Some(1 << 16));
    }

    #[test]
    fn unprovisioned_invalid_window_fails_construction() {
        let zstd = Zstd {
            level: EncoderLevel::Default,
            window_size: Some(5000),
        };
        assert!(matches!(
            zstd.build_encoder(Vec::<u8>::new()),
            Err(EncodeError::WindowOutOfRange(5000))
        ));
    }

    #[test]
    fn level_is_passed_through() {
        for level in EncoderLevel::ALL {
            let zstd = Zstd {
                level,
                window_size: Some(DEFAULT_WINDOW_SIZE),
            };
            assert_eq!(zstd.encoder_options().level, level);
        }
        assert_eq!(EncoderLevel::NotSet.zstd_level(), 0);
        assert!(EncoderLevel::BestCompression.zstd_level() > EncoderLevel::Fastest.zstd_level());
    }

    #[test]
    fn empty_input_still_produces_a_frame() {
        let mut zstd = Zstd::default();
        zstd.provision().unwrap();
        let frame = compress(&zstd, &[]);
        assert!(!frame.is_empty());
        assert!(::zstd::stream::decode_all(&frame[..]).unwrap().is_empty());
    }

    #[test]
    fn encoders_are_independent() {
        let mut zstd = Zstd::default();
        zstd.provision().unwrap();

        let mut a = zstd.new_encoder(Box::new(Vec::<u8>::new())).unwrap();
        let mut b = zstd.new_encoder(Box::new(Vec::<u8>::new())).unwrap();
        assert!(!std::ptr::addr_eq(&*a as *const dyn Encoder, &*b as *const dyn Encoder));

        a.write_all(b"first stream, ").unwrap();
        b.write_all(b"second stream").unwrap();
        a.write_all(b"still first").unwrap();
        b.flush().unwrap();
        drop(b);
        a.finish().unwrap();

        let first = zstd.build_encoder(Vec::<u8>::new()).unwrap();
        let mut second = zstd.build_encoder(Vec::<u8>::new()).unwrap();
        second.write_all(b"only second").unwrap();
        let first = first.finish().unwrap();
        let second = second.finish().unwrap();
        assert!(::zstd::stream::decode_all(&first[..]).unwrap().is_empty());
        assert_eq!(
            ::zstd::stream::decode_all(&second[..]).unwrap(),
            b"only second"
        );
    }

    #[test]
    fn round_trip_with_builder_config() {
        let zstd = ZstdBuilder::new()
            .level(EncoderLevel::BetterCompression)
            .window_size(1 << 20)
            .build();
        let data = sample();
        let mut encoder = zstd.build_encoder(Vec::<u8>::new()).unwrap();
        encoder.write_all(&data).unwrap();
        let out = encoder.finish().unwrap();
        assert!(out.len() < data.len());
        assert_eq!(::zstd::stream::decode_all(&out[..]).unwrap(), data);
    }

    #[test]
    fn accept_encoding_is_constant() {
        assert_eq!(Zstd::default().accept_encoding(), "zstd");
        let mut zstd = parse("zstd best 0").unwrap();
        zstd.provision().unwrap();
        assert_eq!(zstd.accept_encoding(), "zstd");
    }

    #[test]
    fn structured_config_is_passed_through() {
        let zstd: Zstd = serde_json::from_str(r#"{"level":"best","window_size":0}"#).unwrap();
        assert_eq!(zstd.level, EncoderLevel::BestCompression);
        assert_eq!(zstd.window_size, Some(0));

        let zstd: Zstd = serde_json::from_str("{}").unwrap();
        assert_eq!(zstd, Zstd::default());

        let zstd: Zstd = serde_json::from_str(r#"{"level":2,"window_size":null}"#).unwrap();
        assert_eq!(zstd.level, EncoderLevel::Default);
        assert_eq!(zstd.window_size, None);

        assert!(serde_json::from_str::<Zstd>(r#"{"level":"turbo"}"#).is_err());
        assert!(serde_json::from_str::<Zstd>(r#"{"level":9}"#).is_err());
        assert!(serde_json::from_str::<Zstd>(r#"{"window":1024}"#).is_err());
    }

    #[test]
    fn structured_config_serializes_canonical_names() {
        let zstd = Zstd {
            level: EncoderLevel::BetterCompression,
            window_size: Some(65_536),
        };
        assert_eq!(
            serde_json::to_value(&zstd).unwrap(),
            serde_json::json!({"level": "better", "window_size": 65536})
        );
        assert_eq!(
            serde_json::to_value(Zstd::default()).unwrap(),
            serde_json::json!({"window_size": null})
        );
    }
}
