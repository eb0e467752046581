//! Response body variants.
//!
//! A body is either absent, a single buffer, structured JSON that still needs
//! serialization, or a stream of chunks. Compression treats JSON as "serialize
//! first, then compress the bytes" and streams as "splice a transform in".

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

/// Boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// HTTP response body.
pub enum Body {
    /// No body.
    Empty,
    /// A single in-memory buffer.
    Bytes(Bytes),
    /// Structured JSON, serialized on demand.
    Json(serde_json::Value),
    /// A stream of chunks with unknown total length.
    Stream(ByteStream),
}

impl Body {
    /// Create a buffer body.
    #[inline]
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Body::Bytes(data.into())
    }

    /// Create a JSON body.
    #[inline]
    pub fn json(value: serde_json::Value) -> Self {
        Body::Json(value)
    }

    /// Create a streaming body.
    #[inline]
    pub fn stream(stream: ByteStream) -> Self {
        Body::Stream(stream)
    }

    /// Check whether there is anything to send.
    ///
    /// An empty buffer and a JSON `null` both count as "no body", matching
    /// how frameworks treat a null body assignment.
    pub fn is_none(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(data) => data.is_empty(),
            Body::Json(value) => value.is_null(),
            Body::Stream(_) => false,
        }
    }

    /// Known byte length, if any.
    ///
    /// Streams and not-yet-serialized JSON have no known length.
    pub fn len(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(data) => Some(data.len()),
            Body::Json(_) | Body::Stream(_) => None,
        }
    }

    /// Drain the body into a single buffer.
    ///
    /// Stream errors are propagated; JSON is serialized.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Bytes(data) => Ok(data),
            Body::Json(value) => serde_json::to_vec(&value)
                .map(Bytes::from)
                .map_err(io::Error::other),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "Body::Empty"),
            Body::Bytes(data) => write!(f, "Body::Bytes({} bytes)", data.len()),
            Body::Json(value) => write!(f, "Body::Json({})", value),
            Body::Stream(_) => write!(f, "Body::Stream"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Body::Bytes(data)
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(data.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Body::Bytes(Bytes::from(data))
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(data))
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Json(value)
    }
}
