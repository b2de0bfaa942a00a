use std::{
    io::{self, Write},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body_util::BodyExt;
use hyper::body::{Body, Frame};
use parking_lot::Mutex;
use pin_project_lite::pin_project;
use tracing::error;

use crate::{
    body::TakoBody,
    encode::{Encoder, Encoding},
    error::EncodeError,
    types::BoxError,
};

/// Compresses an HTTP body stream with the given encoding.
///
/// # Arguments
///
/// * `body` - The HTTP body stream to compress.
/// * `encoding` - A provisioned encoding; one fresh encoder is created for this body.
///
/// # Returns
///
/// A `TakoBody` containing the compressed stream, or the error raised while
/// constructing the encoder.
pub fn stream_encode<B>(body: B, encoding: &dyn Encoding) -> Result<TakoBody, EncodeError>
where
    B: Body<Data = Bytes, Error = BoxError> + Send + 'static,
{
    let buffer = SharedBuffer::default();
    let encoder = encoding.new_encoder(Box::new(buffer.clone()))?;
    let upstream = body.into_data_stream();
    let stream = EncodeStream::new(upstream, encoder, buffer).map_ok(Frame::data);
    Ok(TakoBody::from_try_stream(stream))
}

/// Sink shared between an encoder and the stream draining its output.
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pin_project! {
    /// A stream that compresses data with a boxed [`Encoder`].
    ///
    /// Every input chunk is written and flushed, so each chunk produces compressed
    /// output right away. The frame is finished once the inner stream ends.
    pub struct EncodeStream<S> {
        #[pin] inner: S,
        encoder: Option<Box<dyn Encoder>>,
        buffer: SharedBuffer,
        done: bool,
    }
}

impl<S> EncodeStream<S> {
    fn new(stream: S, encoder: Box<dyn Encoder>, buffer: SharedBuffer) -> Self {
        Self {
            inner: stream,
            encoder: Some(encoder),
            buffer,
            done: false,
        }
    }
}

impl<S> Stream for EncodeStream<S>
where
    S: Stream<Item = Result<Bytes, BoxError>>,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            // Emit whatever the encoder produced since the last poll.
            let pending = this.buffer.take();
            if !pending.is_empty() {
                return Poll::Ready(Some(Ok(Bytes::from(pending))));
            }
            if *this.done {
                return Poll::Ready(None);
            }
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(data))) => {
                    let written = match this.encoder.as_mut() {
                        Some(enc) => enc.write_all(&data).and_then(|_| enc.flush()),
                        None => Ok(()),
                    };
                    if let Err(e) = written {
                        error!("encoder write failed: {e}");
                        *this.done = true;
                        this.encoder.take();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    this.encoder.take();
                    return Poll::Ready(Some(Err(io::Error::other(e))));
                }
                // Upstream ended: finish the frame, then drain the tail.
                Poll::Ready(None) => {
                    *this.done = true;
                    if let Some(enc) = this.encoder.take() {
                        if let Err(e) = enc.finish() {
                            error!("encoder finish failed: {e}");
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
