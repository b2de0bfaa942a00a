//! Capability traits shared by content-encoding modules.
//!
//! A module is configured once (from JSON or from directive tokens), provisioned once,
//! and then used read-only to create one encoder per response. The set of available
//! modules is closed and enumerated by [`EncodingModule`].

use std::io::{self, Write};

use crate::{directive::Dispenser, error::EncodeError};

pub mod zstd;

use self::zstd::Zstd;

/// Output sink an encoder writes compressed bytes into.
pub type Sink = Box<dyn Write + Send>;

/// A streaming compressor bound to an output sink.
///
/// Bytes written are compressed into the sink; `flush` pushes out everything
/// compressed so far and `finish` terminates the frame.
pub trait Encoder: Write + Send {
    /// Finalizes the compressed stream and returns the sink.
    fn finish(self: Box<Self>) -> io::Result<Sink>;
}

/// A content encoding that can be negotiated through `Accept-Encoding`.
pub trait Encoding: Send + Sync {
    /// Token matched against the client's `Accept-Encoding` header.
    fn accept_encoding(&self) -> &'static str;

    /// Creates a fresh encoder writing into `sink`.
    ///
    /// Every call returns an independent instance.
    fn new_encoder(&self, sink: Sink) -> Result<Box<dyn Encoder>, EncodeError>;
}

/// Fills in defaults after configuration has been populated.
pub trait Provisioner {
    fn provision(&mut self) -> Result<(), EncodeError>;
}

/// Populates a module from its directive tokens.
pub trait UnmarshalDirective {
    fn unmarshal_directive(&mut self, d: &mut Dispenser) -> Result<(), EncodeError>;
}

/// All encoding modules this crate provides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodingModule {
    Zstd(Zstd),
}

impl EncodingModule {
    /// Registry id of the module.
    pub fn id(&self) -> &'static str {
        match self {
            EncodingModule::Zstd(_) => zstd::MODULE_ID,
        }
    }

    /// Replaces the module's configuration with a decoded structured value.
    pub fn decode_json(&mut self, raw: serde_json::Value) -> Result<(), EncodeError> {
        match self {
            EncodingModule::Zstd(z) => *z = serde_json::from_value(raw)?,
        }
        Ok(())
    }
}

impl Encoding for EncodingModule {
    fn accept_encoding(&self) -> &'static str {
        match self {
            EncodingModule::Zstd(z) => z.accept_encoding(),
        }
    }

    fn new_encoder(&self, sink: Sink) -> Result<Box<dyn Encoder>, EncodeError> {
        match self {
            EncodingModule::Zstd(z) => z.new_encoder(sink),
        }
    }
}

impl Provisioner for EncodingModule {
    fn provision(&mut self) -> Result<(), EncodeError> {
        match self {
            EncodingModule::Zstd(z) => z.provision(),
        }
    }
}

impl UnmarshalDirective for EncodingModule {
    fn unmarshal_directive(&mut self, d: &mut Dispenser) -> Result<(), EncodeError> {
        match self {
            EncodingModule::Zstd(z) => z.unmarshal_directive(d),
        }
    }
}

impl From<Zstd> for EncodingModule {
    fn from(z: Zstd) -> Self {
        EncodingModule::Zstd(z)
    }
}
