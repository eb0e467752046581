//! HTTP request abstraction for the compression layer.

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, Method, Uri};

/// Header name constants for fast lookup.
mod header_names {
    use super::*;

    pub static ACCEPT_ENCODING: HeaderName = header::ACCEPT_ENCODING;
}

/// HTTP request.
///
/// Note: Clone is intentionally not derived to prevent expensive copies.
/// Use references or move semantics instead.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Create a new request.
    #[inline]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    /// Create a GET request for a path, no headers.
    #[inline]
    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri, HeaderMap::new(), Bytes::new())
    }

    /// Get the HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request path.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the query string.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Get the full URI.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a mutable reference to headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get the request body.
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get a header value by name (fast path with HeaderName constant).
    #[inline]
    fn header_by_name(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a header value by string name (slower, case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Accept-Encoding header value.
    #[inline]
    pub fn accept_encoding(&self) -> Option<&str> {
        self.header_by_name(&header_names::ACCEPT_ENCODING)
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<Bytes>,
{
    fn from(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: body.into(),
        }
    }
}
