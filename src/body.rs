//! This module provides the `TakoBody` struct, a boxed HTTP body used both as the input
//! and the output of the streaming encoders. It includes constructors for empty,
//! buffered and stream-backed bodies.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::Stream;
use http_body::{Body, Frame, SizeHint};
use http_body_util::{BodyExt, Empty, StreamBody};

use crate::types::{BoxBody, BoxError};

/// The `TakoBody` struct is a wrapper around a boxed HTTP body (`BoxBody`).
///
/// # Example
///
/// ```rust
/// use tako_zstd::body::TakoBody;
///
/// let empty_body = TakoBody::empty();
/// let string_body = TakoBody::from("Hello, world!".to_string());
/// ```
pub struct TakoBody(BoxBody);

impl TakoBody {
    /// Creates a new `TakoBody` from a given body.
    ///
    /// # Arguments
    ///
    /// * `body` - The body to wrap, which must implement the `Body` trait.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(|e| e.into()).boxed_unsync())
    }

    /// Creates a `TakoBody` from a fallible stream of frames.
    ///
    /// Every `Ok` item becomes one body frame; the first `Err` terminates the body.
    pub fn from_try_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Frame<Bytes>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(StreamBody::new(stream))
    }

    /// Creates an empty `TakoBody`.
    pub fn empty() -> Self {
        Self::new(Empty::new())
    }
}

/// Provides a default implementation for `TakoBody`, which returns an empty body.
impl Default for TakoBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<()> for TakoBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

macro_rules! body_from_impl {
    ($ty:ty) => {
        impl From<$ty> for TakoBody {
            fn from(buf: $ty) -> Self {
                Self::new(http_body_util::Full::from(buf))
            }
        }
    };
}

body_from_impl!(&'static str);
body_from_impl!(String);
body_from_impl!(Vec<u8>);
body_from_impl!(Bytes);

/// Implements the `Body` trait for `TakoBody`, delegating to the inner `BoxBody`.
impl Body for TakoBody {
    type Data = Bytes;
    type Error = BoxError;

    #[inline]
    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.0).poll_frame(cx)
    }

    #[inline]
    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }

    #[inline]
    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }
}
