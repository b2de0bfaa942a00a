use std::{fmt, io};

use crate::size::ParseSizeError;

/// Error type shared by configuration loading, provisioning and encoder construction.
#[derive(Debug)]
pub enum EncodeError {
    /// A compression level literal outside the accepted set.
    InvalidLevel(String),
    /// A window size literal the byte size grammar rejected.
    InvalidWindowSize {
        literal: String,
        source: ParseSizeError,
    },
    /// An explicit window size the encoder cannot use.
    WindowOutOfRange(u64),
    /// The underlying compressor refused the requested options.
    Construct(io::Error),
    /// No module is registered under the given id.
    UnknownModule(String),
    /// A module with the same id is already registered.
    DuplicateModule(String),
    /// Malformed structured configuration.
    Json(serde_json::Error),
    /// Malformed directive input.
    Syntax(String),
    /// Another error, tagged with the directive location it came from.
    Directive {
        file: String,
        line: usize,
        source: Box<EncodeError>,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::InvalidLevel(literal) => write!(
                f,
                "unexpected compression level '{literal}', use one of {}",
                crate::encode::zstd::EncoderLevel::accepted_literals()
            ),
            EncodeError::InvalidWindowSize { literal, source } => {
                write!(f, "incorrect window size '{literal}': {source}")
            }
            EncodeError::WindowOutOfRange(size) => write!(
                f,
                "window size {size} must be 0 or a power of two between {} and {} bytes",
                crate::encode::zstd::MIN_WINDOW_SIZE,
                crate::encode::zstd::MAX_WINDOW_SIZE
            ),
            EncodeError::Construct(err) => write!(f, "failed to construct encoder: {err}"),
            EncodeError::UnknownModule(id) => write!(f, "module not registered: {id}"),
            EncodeError::DuplicateModule(id) => write!(f, "module already registered: {id}"),
            EncodeError::Json(err) => write!(f, "decoding encoder config: {err}"),
            EncodeError::Syntax(msg) => f.write_str(msg),
            EncodeError::Directive { file, line, source } => write!(f, "{file}:{line} - {source}"),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::InvalidWindowSize { source, .. } => Some(source),
            EncodeError::Construct(err) => Some(err),
            EncodeError::Json(err) => Some(err),
            EncodeError::Directive { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::Json(err)
    }
}

impl EncodeError {
    /// Returns the innermost error, looking through directive location wrappers.
    pub fn root(&self) -> &EncodeError {
        match self {
            EncodeError::Directive { source, .. } => source.root(),
            other => other,
        }
    }
}
