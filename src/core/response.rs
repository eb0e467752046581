//! HTTP response abstraction for the compression layer.

use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

use super::body::Body;

/// Common header name constants for fast lookup.
mod header_names {
    use super::*;

    pub static CACHE_CONTROL: HeaderName = header::CACHE_CONTROL;
    pub static CONTENT_ENCODING: HeaderName = header::CONTENT_ENCODING;
    pub static CONTENT_LENGTH: HeaderName = header::CONTENT_LENGTH;
    pub static CONTENT_TYPE: HeaderName = header::CONTENT_TYPE;
    pub static VARY: HeaderName = header::VARY;
}

/// HTTP response.
///
/// Carries the transport state the compression layer needs to consult:
/// whether headers have already been flushed, whether the output side is
/// still writable, and an optional per-response compression override.
///
/// Note: Clone is intentionally not derived to prevent expensive copies.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    headers_sent: bool,
    writable: bool,
    compress: Option<bool>,
}

impl Response {
    /// Create a new response builder.
    #[inline]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// Create a 200 OK response with body.
    #[inline]
    pub fn ok(body: impl Into<Body>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
            headers_sent: false,
            writable: true,
            compress: None,
        }
    }

    /// Create an empty response with given status.
    #[inline]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::Empty,
            headers_sent: false,
            writable: true,
            compress: None,
        }
    }

    // Getters

    /// Get the status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
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

    /// Get the response body.
    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Take the body out, leaving `Body::Empty` behind.
    #[inline]
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Replace the body.
    #[inline]
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Known body length, if any.
    #[inline]
    pub fn body_len(&self) -> Option<usize> {
        self.body.len()
    }

    /// Whether headers have already been flushed to the transport.
    #[inline]
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Whether the output side is still writable.
    #[inline]
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Per-response compression override, if any.
    ///
    /// `Some(true)` forces compression past the content-type filter,
    /// `Some(false)` disables compression outright, `None` leaves the
    /// decision to configuration.
    #[inline]
    pub fn compress_override(&self) -> Option<bool> {
        self.compress
    }

    /// Get a header value by HeaderName (fast path).
    #[inline]
    fn header_by_name(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a header value by string name (slower, case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Content-Type header (fast path).
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.header_by_name(&header_names::CONTENT_TYPE)
    }

    /// Get Content-Encoding header (fast path).
    #[inline]
    pub fn content_encoding(&self) -> Option<&str> {
        self.header_by_name(&header_names::CONTENT_ENCODING)
    }

    /// Get Cache-Control header (fast path).
    #[inline]
    pub fn cache_control(&self) -> Option<&str> {
        self.header_by_name(&header_names::CACHE_CONTROL)
    }

    // Modifiers

    /// Set the status code.
    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header by string name and value.
    #[inline]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the body (builder-style).
    #[inline]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Mark headers as already flushed.
    #[inline]
    pub fn with_headers_sent(mut self) -> Self {
        self.headers_sent = true;
        self
    }

    /// Mark the output side as no longer writable.
    #[inline]
    pub fn with_unwritable(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Set the per-response compression override.
    #[inline]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    /// Set Content-Encoding (typed fast path).
    #[inline]
    pub fn set_content_encoding(&mut self, value: HeaderValue) {
        self.headers
            .insert(header_names::CONTENT_ENCODING.clone(), value);
    }

    /// Remove Content-Length; call whenever the body is replaced and the
    /// declared length would be stale.
    #[inline]
    pub fn remove_content_length(&mut self) {
        self.headers.remove(&header_names::CONTENT_LENGTH);
    }

    /// Append a field name to the Vary header, without duplicating it.
    ///
    /// A `Vary: *` already covers everything and is left alone.
    pub fn append_vary(&mut self, field: &str) {
        let existing = self.header_by_name(&header_names::VARY);
        let value = match existing {
            Some(v) if v.trim() == "*" => return,
            Some(v) => {
                let already = v
                    .split(',')
                    .any(|item| item.trim().eq_ignore_ascii_case(field));
                if already {
                    return;
                }
                format!("{}, {}", v, field)
            }
            None => field.to_string(),
        };
        if let Ok(value) = HeaderValue::try_from(value) {
            self.headers.insert(header_names::VARY.clone(), value);
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::Empty,
            headers_sent: false,
            writable: true,
            compress: None,
        }
    }
}

/// Builder for creating HTTP responses.
pub struct ResponseBuilder {
    response: Response,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder {
    /// Create a new response builder.
    #[inline]
    pub fn new() -> Self {
        Self {
            response: Response::default(),
        }
    }

    /// Set the status code.
    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.response.status = status;
        self
    }

    /// Add header by strings.
    #[inline]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.response = self.response.with_header(name, value);
        self
    }

    /// Set the body.
    #[inline]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.response.body = body.into();
        self
    }

    /// Set Content-Type header.
    #[inline]
    pub fn content_type(self, content_type: &str) -> Self {
        self.header("content-type", content_type)
    }

    /// Build the response.
    #[inline]
    pub fn build(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_builder() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("x-custom", "value")
            .body("Hello")
            .build();

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.header("x-custom"), Some("value"));
        assert_eq!(res.body_len(), Some(5));
    }

    #[test]
    fn test_response_ok() {
        let res = Response::ok("OK");
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.writable());
        assert!(!res.headers_sent());
        assert!(res.compress_override().is_none());
    }

    #[test]
    fn test_transport_flags() {
        let res = Response::ok("x").with_headers_sent().with_unwritable();
        assert!(res.headers_sent());
        assert!(!res.writable());
    }

    #[test]
    fn test_compress_override() {
        assert_eq!(
            Response::ok("x").with_compress(false).compress_override(),
            Some(false)
        );
        assert_eq!(
            Response::ok("x").with_compress(true).compress_override(),
            Some(true)
        );
    }

    #[test]
    fn test_take_body() {
        let mut res = Response::ok("payload");
        let body = res.take_body();
        assert_eq!(body.len(), Some(7));
        assert!(res.body().is_none());
    }

    #[test]
    fn test_remove_content_length() {
        let mut res = Response::builder().header("content-length", "42").build();
        assert_eq!(res.header("content-length"), Some("42"));
        res.remove_content_length();
        assert!(res.header("content-length").is_none());
    }

    #[test]
    fn test_append_vary() {
        let mut res = Response::ok("x");
        res.append_vary("Accept-Encoding");
        assert_eq!(res.header("vary"), Some("Accept-Encoding"));

        // no duplicate, case-insensitive
        res.append_vary("accept-encoding");
        assert_eq!(res.header("vary"), Some("Accept-Encoding"));

        let mut res = Response::builder().header("vary", "Origin").build();
        res.append_vary("Accept-Encoding");
        assert_eq!(res.header("vary"), Some("Origin, Accept-Encoding"));

        let mut res = Response::builder().header("vary", "*").build();
        res.append_vary("Accept-Encoding");
        assert_eq!(res.header("vary"), Some("*"));
    }

    #[test]
    fn test_content_accessors() {
        let res = Response::builder()
            .content_type("text/html; charset=utf-8")
            .header("content-encoding", "gzip")
            .header("cache-control", "no-transform")
            .build();

        assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(res.content_encoding(), Some("gzip"));
        assert_eq!(res.cache_control(), Some("no-transform"));
    }
}
