//! Streaming compression transform.
//!
//! Wraps a body stream and pushes every chunk through an [`Encoder`],
//! yielding compressed chunks as the codec produces them. The transform
//! never buffers the whole response; suspension happens only when the
//! underlying stream is pending.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

use super::encoder::Encoder;
use crate::core::ByteStream;

/// A body stream spliced through a compression codec.
///
/// On an upstream error the codec is torn down and the error is forwarded
/// unmodified; no recovery is attempted since a partially-streamed
/// compressed response cannot be retried safely.
pub struct CompressedStream {
    inner: Option<ByteStream>,
    encoder: Option<Box<dyn Encoder>>,
}

impl CompressedStream {
    /// Splice `encoder` into `inner`'s chunk path.
    pub fn new(inner: ByteStream, encoder: Box<dyn Encoder>) -> Self {
        Self {
            inner: Some(inner),
            encoder: Some(encoder),
        }
    }

    fn teardown(&mut self) {
        self.inner = None;
        self.encoder = None;
    }
}

impl Stream for CompressedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let Some(encoder) = this.encoder.as_mut() else {
                        return Poll::Ready(None);
                    };
                    let out = encoder
                        .write(&chunk)
                        .and_then(|()| encoder.take());
                    match out {
                        Ok(out) if out.is_empty() => continue, // codec still accumulating
                        Ok(out) => return Poll::Ready(Some(Ok(out))),
                        Err(e) => {
                            this.teardown();
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                Some(Err(e)) => {
                    this.teardown();
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.inner = None;
                    let Some(encoder) = this.encoder.take() else {
                        return Poll::Ready(None);
                    };
                    return match encoder.finish() {
                        Ok(tail) if tail.is_empty() => Poll::Ready(None),
                        Ok(tail) => Poll::Ready(Some(Ok(tail))),
                        Err(e) => Poll::Ready(Some(Err(e))),
                    };
                }
            }
        }
    }
}
