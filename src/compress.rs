//! Compression orchestrator.
//!
//! Glues the pieces together for one response: decide eligibility, negotiate
//! a coding, consult the payload cache, and splice the codec into the body.
//! Failures never surface to the client; a response that cannot be
//! compressed is served untouched.

use http::{HeaderValue, Method, StatusCode};

use crate::cache::CompressedCache;
use crate::config::{CompressConfig, ConfigError};
use crate::core::{Body, Request, Response};
use crate::encoding::{compress_bytes, for_encoding, CompressedStream, Encoding};
use crate::negotiate::{AcceptEncoding, Negotiated};

/// Statuses that must not carry a body.
const BODYLESS: [StatusCode; 3] = [
    StatusCode::NO_CONTENT,
    StatusCode::RESET_CONTENT,
    StatusCode::NOT_MODIFIED,
];

const VARY_FIELD: &str = "Accept-Encoding";

/// The response-compression layer.
///
/// Construct once, apply to every response. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Compress {
    config: CompressConfig,
    cache: Option<CompressedCache>,
    encodings: Vec<Encoding>,
}

impl Compress {
    /// Build the layer, validating the configuration.
    pub fn new(config: CompressConfig) -> Result<Self, ConfigError> {
        let encodings = config.enabled_encodings();
        if encodings.is_empty() {
            return Err(ConfigError::NoEncodings);
        }
        if Encoding::from_token(&config.default_encoding).is_none()
            && config.default_encoding != "identity"
            && config.default_encoding != "*"
        {
            return Err(ConfigError::UnknownEncoding {
                token: config.default_encoding.clone(),
            });
        }
        let cache = config
            .cache
            .as_ref()
            .map(|c| CompressedCache::with_store(c.store.clone()));
        Ok(Self {
            config,
            cache,
            encodings,
        })
    }

    /// Layer with default settings.
    pub fn with_defaults() -> Self {
        // defaults always validate
        Self::new(CompressConfig::default()).unwrap_or_else(|_| unreachable!())
    }

    /// Apply compression to a response.
    ///
    /// Returns `true` when a codec (or cached payload) was spliced in. The
    /// `Vary` header is adjusted even when the response is left untouched,
    /// since the decision depended on `Accept-Encoding` either way.
    pub fn apply(&self, req: &Request, res: &mut Response) -> bool {
        res.append_vary(VARY_FIELD);

        if let Some(reason) = self.skip_reason(req, res) {
            tracing::trace!(path = %req.path(), reason, "compression skipped");
            return false;
        }

        let preferences = AcceptEncoding::parse(req.accept_encoding(), &self.config.default_encoding);
        let encoding = match preferences.select(&self.encodings) {
            Negotiated::Encoding(encoding) => encoding,
            Negotiated::Identity => {
                tracing::trace!(path = %req.path(), "client prefers identity");
                return false;
            }
            Negotiated::NotAcceptable => {
                // serve as-is rather than 406
                tracing::debug!(path = %req.path(), "no acceptable coding, serving identity");
                return false;
            }
        };

        // cache lookup before spending codec cycles
        if let Some(payload) = self.cache_lookup(req, encoding) {
            tracing::debug!(path = %req.path(), encoding = %encoding, "serving cached payload");
            self.mark_encoded(res, encoding);
            res.set_body(Body::stream(CompressedCache::replay(payload)));
            return true;
        }

        self.encode(req, res, encoding)
    }

    /// Eligibility checks, in the order a transport would hit them.
    fn skip_reason(&self, req: &Request, res: &Response) -> Option<&'static str> {
        if res.body().is_none() {
            return Some("empty body");
        }
        if res.headers_sent() {
            return Some("headers already sent");
        }
        if !res.writable() {
            return Some("response not writable");
        }
        if res.compress_override() == Some(false) {
            return Some("disabled for this response");
        }
        if req.method() == Method::HEAD {
            return Some("HEAD request");
        }
        if BODYLESS.contains(&res.status()) {
            return Some("bodyless status");
        }
        if res.content_encoding().is_some() {
            return Some("already encoded");
        }

        let forced = res.compress_override() == Some(true);
        if !forced {
            let content_type = res.content_type().unwrap_or("");
            if !(self.config.filter)(content_type) {
                return Some("content type not compressible");
            }
        }
        if has_no_transform(res.cache_control()) {
            return Some("cache-control no-transform");
        }
        if self.config.threshold > 0 {
            // unknown lengths (streams, unserialized JSON) pass through
            if let Some(len) = res.body_len() {
                if len <= self.config.threshold {
                    return Some("body under threshold");
                }
            }
        }
        None
    }

    /// Compress the body with the negotiated coding.
    ///
    /// Buffered bodies are compressed eagerly; streams get the codec spliced
    /// in. A codec failure on a buffered body restores the original bytes.
    fn encode(&self, req: &Request, res: &mut Response, encoding: Encoding) -> bool {
        let opts = self
            .config
            .codec_options(encoding)
            .unwrap_or_else(|| encoding.default_options());

        match res.take_body() {
            Body::Bytes(data) => match compress_bytes(&data, encoding, opts) {
                Ok(compressed) => {
                    tracing::trace!(
                        path = %req.path(),
                        encoding = %encoding,
                        original = data.len(),
                        compressed = compressed.len(),
                        "compressed response"
                    );
                    self.mark_encoded(res, encoding);
                    self.cache_store(req, encoding, compressed.clone());
                    res.set_body(compressed);
                    true
                }
                Err(error) => {
                    tracing::warn!(path = %req.path(), %error, "compression failed, serving identity");
                    res.set_body(data);
                    false
                }
            },
            Body::Json(value) => {
                let serialized = match serde_json::to_vec(&value) {
                    Ok(serialized) => bytes::Bytes::from(serialized),
                    Err(error) => {
                        tracing::warn!(path = %req.path(), %error, "JSON serialization failed");
                        res.set_body(Body::Json(value));
                        return false;
                    }
                };
                // length is only known now; re-check the threshold
                if self.config.threshold > 0 && serialized.len() <= self.config.threshold {
                    tracing::trace!(path = %req.path(), "serialized JSON under threshold");
                    res.set_body(serialized);
                    return false;
                }
                match compress_bytes(&serialized, encoding, opts) {
                    Ok(compressed) => {
                        self.mark_encoded(res, encoding);
                        self.cache_store(req, encoding, compressed.clone());
                        res.set_body(compressed);
                        true
                    }
                    Err(error) => {
                        tracing::warn!(path = %req.path(), %error, "compression failed, serving identity");
                        res.set_body(serialized);
                        false
                    }
                }
            }
            Body::Stream(inner) => {
                self.mark_encoded(res, encoding);
                let mut stream: crate::core::ByteStream =
                    Box::pin(CompressedStream::new(inner, for_encoding(encoding, opts)));
                if let Some((cache, key, ttl)) = self.capture_plan(req, encoding) {
                    stream = cache.capture(stream, key, ttl);
                }
                res.set_body(Body::stream(stream));
                true
            }
            // skip_reason already rejected empty bodies
            Body::Empty => false,
        }
    }

    /// Set Content-Encoding and drop the now-stale Content-Length.
    fn mark_encoded(&self, res: &mut Response, encoding: Encoding) {
        res.set_content_encoding(HeaderValue::from_static(encoding.token()));
        res.remove_content_length();
    }

    /// Cached payload for this request and coding, if any.
    fn cache_lookup(&self, req: &Request, encoding: Encoding) -> Option<bytes::Bytes> {
        let cache = self.cache.as_ref()?;
        let config = self.config.cache.as_ref()?;
        cache.get(&cache_key(config, req, encoding))
    }

    /// Store an eagerly-compressed payload when the capture predicate allows.
    fn cache_store(&self, req: &Request, encoding: Encoding, payload: bytes::Bytes) {
        let Some((cache, key, ttl)) = self.capture_plan(req, encoding) else {
            return;
        };
        cache.insert(&key, payload, ttl);
        tracing::debug!(key = %key, "cached compressed payload");
    }

    /// Cache handle, key, and TTL for a request that should be captured.
    fn capture_plan(
        &self,
        req: &Request,
        encoding: Encoding,
    ) -> Option<(CompressedCache, String, Option<std::time::Duration>)> {
        let cache = self.cache.as_ref()?;
        let config = self.config.cache.as_ref()?;
        if !(config.capture)(req) {
            return None;
        }
        let key = cache_key(config, req, encoding);
        if cache.has(&key) {
            return None;
        }
        Some((cache.clone(), key, (config.ttl)(req)))
    }
}

/// Full store key: the user key qualified by the coding, so a brotli payload
/// is never replayed to a gzip-only client.
fn cache_key(config: &crate::config::CacheConfig, req: &Request, encoding: Encoding) -> String {
    format!("{}:{}", encoding.token(), (config.key)(req))
}

/// Whether a Cache-Control value contains the `no-transform` directive.
///
/// Directive match is whole-token: `no-transform-x` does not count.
fn has_no_transform(cache_control: Option<&str>) -> bool {
    let Some(value) = cache_control else {
        return false;
    };
    value
        .split(',')
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-transform"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use bytes::{Bytes, BytesMut};
    use futures_util::{stream, StreamExt};
    use std::io::Read;

    fn request(accept_encoding: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method("GET").uri("/resource");
        if let Some(ae) = accept_encoding {
            builder = builder.header("accept-encoding", ae);
        }
        Request::from(builder.body(Bytes::new()).unwrap())
    }

    fn large_text_response() -> Response {
        Response::builder()
            .content_type("text/plain")
            .body("compress me, I am repetitive text ".repeat(100))
            .build()
    }

    fn layer() -> Compress {
        Compress::with_defaults()
    }

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    fn unbrotli(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_compresses_with_negotiated_coding() {
        let mut res = large_text_response();
        let original_len = res.body_len().unwrap();

        assert!(layer().apply(&request(Some("gzip")), &mut res));
        assert_eq!(res.content_encoding(), Some("gzip"));
        assert_eq!(res.header("vary"), Some("Accept-Encoding"));
        assert!(res.body_len().unwrap() < original_len);
    }

    #[test]
    fn test_brotli_preferred_over_gzip() {
        let mut res = large_text_response();
        assert!(layer().apply(&request(Some("gzip, br")), &mut res));
        assert_eq!(res.content_encoding(), Some("br"));
    }

    #[test]
    fn test_compressed_bytes_decode() {
        let body = "round trip through the layer ".repeat(100);
        let mut res = Response::builder()
            .content_type("text/plain")
            .body(body.clone())
            .build();

        assert!(layer().apply(&request(Some("gzip")), &mut res));
        let Body::Bytes(compressed) = res.body() else {
            panic!("expected buffered body");
        };
        assert_eq!(gunzip(compressed), body.as_bytes());
    }

    #[test]
    fn test_vary_appended_even_when_skipped() {
        let mut res = Response::builder().content_type("image/png").body("x").build();
        assert!(!layer().apply(&request(Some("gzip")), &mut res));
        assert_eq!(res.header("vary"), Some("Accept-Encoding"));
        assert!(res.content_encoding().is_none());
    }

    #[test]
    fn test_removes_content_length() {
        let res = large_text_response();
        let len = res.body_len().unwrap();
        let mut res = res.with_header("content-length", len.to_string());

        assert!(layer().apply(&request(Some("gzip")), &mut res));
        assert!(res.header("content-length").is_none());
    }

    #[test]
    fn test_skips_empty_body() {
        let mut res = Response::empty(StatusCode::OK);
        assert!(!layer().apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_skips_headers_sent() {
        let mut res = large_text_response().with_headers_sent();
        assert!(!layer().apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_skips_unwritable() {
        let mut res = large_text_response().with_unwritable();
        assert!(!layer().apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_skips_disabled_override() {
        let mut res = large_text_response().with_compress(false);
        assert!(!layer().apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_force_override_beats_filter() {
        // binary content type, but forced on and over the threshold
        let mut res = Response::builder()
            .content_type("application/octet-stream")
            .body("opaque but repetitive payload ".repeat(100))
            .build()
            .with_compress(true);

        assert!(layer().apply(&request(Some("gzip")), &mut res));
        assert_eq!(res.content_encoding(), Some("gzip"));
    }

    #[test]
    fn test_force_override_still_respects_threshold() {
        // the override only bypasses the content-type filter; a body under
        // the threshold stays identity even when forced
        let mut res = Response::builder()
            .content_type("text/plain")
            .body("tiny")
            .build()
            .with_compress(true);

        assert!(!layer().apply(&request(Some("gzip")), &mut res));
        assert!(res.content_encoding().is_none());
    }

    #[test]
    fn test_forced_small_json_stays_identity() {
        let mut res = Response::builder()
            .content_type("application/json")
            .body(serde_json::json!({"ok": true}))
            .build()
            .with_compress(true);

        assert!(!layer().apply(&request(Some("gzip")), &mut res));
        assert!(res.content_encoding().is_none());
        assert!(matches!(res.body(), Body::Bytes(_)));
    }

    #[test]
    fn test_skips_head_request() {
        let req = Request::from(
            http::Request::builder()
                .method("HEAD")
                .uri("/resource")
                .header("accept-encoding", "gzip")
                .body(Bytes::new())
                .unwrap(),
        );
        let mut res = large_text_response();
        assert!(!layer().apply(&req, &mut res));
    }

    #[test]
    fn test_skips_bodyless_statuses() {
        for status in [
            StatusCode::NO_CONTENT,
            StatusCode::RESET_CONTENT,
            StatusCode::NOT_MODIFIED,
        ] {
            let mut res = large_text_response().with_status(status);
            assert!(!layer().apply(&request(Some("gzip")), &mut res), "{}", status);
        }
    }

    #[test]
    fn test_skips_already_encoded() {
        let mut res = large_text_response().with_header("content-encoding", "gzip");
        let before = res.body_len();
        assert!(!layer().apply(&request(Some("br")), &mut res));
        assert_eq!(res.body_len(), before);
        assert_eq!(res.content_encoding(), Some("gzip"));
    }

    #[test]
    fn test_skips_no_transform() {
        for value in ["no-transform", "public, no-transform", "NO-TRANSFORM"] {
            let mut res = large_text_response().with_header("cache-control", value);
            assert!(!layer().apply(&request(Some("gzip")), &mut res), "{}", value);
        }

        // whole-directive match only
        let mut res = large_text_response().with_header("cache-control", "no-transform-x");
        assert!(layer().apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let layer = Compress::new(CompressConfig::new().threshold(10)).unwrap();

        // exactly at the threshold stays uncompressed
        let mut res = Response::builder()
            .content_type("text/plain")
            .body("a".repeat(10))
            .build();
        assert!(!layer.apply(&request(Some("gzip")), &mut res));

        // one byte over gets compressed
        let mut res = Response::builder()
            .content_type("text/plain")
            .body("a".repeat(11))
            .build();
        assert!(layer.apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_zero_threshold_compresses_everything() {
        let layer = Compress::new(CompressConfig::new().threshold(0)).unwrap();
        let mut res = Response::builder().content_type("text/plain").body("x").build();
        assert!(layer.apply(&request(Some("gzip")), &mut res));
    }

    #[test]
    fn test_identity_preference_leaves_untouched() {
        let mut res = large_text_response();
        assert!(!layer().apply(&request(Some("identity")), &mut res));
        assert!(res.content_encoding().is_none());
    }

    #[test]
    fn test_not_acceptable_serves_identity() {
        let mut res = large_text_response();
        let req = request(Some("gzip;q=0, br;q=0, deflate;q=0, identity;q=0"));
        assert!(!layer().apply(&req, &mut res));
        assert!(res.content_encoding().is_none());
        assert!(matches!(res.body(), Body::Bytes(_)));
    }

    #[test]
    fn test_absent_header_default_identity() {
        let mut res = large_text_response();
        assert!(!layer().apply(&request(None), &mut res));
    }

    #[test]
    fn test_absent_header_default_wildcard() {
        let layer = Compress::new(CompressConfig::new().default_encoding("*")).unwrap();
        let mut res = large_text_response();
        assert!(layer.apply(&request(None), &mut res));
        assert_eq!(res.content_encoding(), Some("br"));
    }

    #[test]
    fn test_disabled_codec_not_negotiated() {
        let layer = Compress::new(CompressConfig::new().brotli(None)).unwrap();
        let mut res = large_text_response();
        assert!(layer.apply(&request(Some("br, gzip")), &mut res));
        assert_eq!(res.content_encoding(), Some("gzip"));
    }

    #[test]
    fn test_all_codecs_disabled_is_config_error() {
        let result = Compress::new(
            CompressConfig::new().brotli(None).gzip(None).deflate(None),
        );
        assert!(matches!(result, Err(ConfigError::NoEncodings)));
    }

    #[test]
    fn test_bad_default_encoding_is_config_error() {
        let result = Compress::new(CompressConfig::new().default_encoding("zstd"));
        assert!(matches!(result, Err(ConfigError::UnknownEncoding { .. })));
    }

    #[tokio::test]
    async fn test_json_body_serialized_then_compressed() {
        let value = serde_json::json!({
            "items": (0..200).map(|i| format!("item-{}", i)).collect::<Vec<_>>(),
        });
        let expected = serde_json::to_vec(&value).unwrap();

        let mut res = Response::builder()
            .content_type("application/json")
            .body(value)
            .build();

        assert!(layer().apply(&request(Some("br")), &mut res));
        assert_eq!(res.content_encoding(), Some("br"));

        let compressed = res.take_body().collect().await.unwrap();
        assert_eq!(unbrotli(&compressed), expected);
    }

    #[test]
    fn test_small_json_stays_identity() {
        let mut res = Response::builder()
            .content_type("application/json")
            .body(serde_json::json!({"ok": true}))
            .build();

        assert!(!layer().apply(&request(Some("gzip")), &mut res));
        assert!(res.content_encoding().is_none());
        // serialized in place so the transport can still send it
        assert!(matches!(res.body(), Body::Bytes(_)));
    }

    #[tokio::test]
    async fn test_stream_body_spliced() {
        let data = b"streamed response body chunk ".repeat(100);
        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(128)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let mut res = Response::builder()
            .content_type("text/plain")
            .body(Body::stream(Box::pin(stream::iter(chunks))))
            .build();

        assert!(layer().apply(&request(Some("gzip")), &mut res));
        assert_eq!(res.content_encoding(), Some("gzip"));

        let compressed = res.take_body().collect().await.unwrap();
        assert_eq!(gunzip(&compressed), data);
    }

    fn caching_layer() -> Compress {
        Compress::new(
            CompressConfig::new().cache(CacheConfig::new().capture(|_| true)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cache_round_trip_buffered() {
        let layer = caching_layer();

        let mut first = large_text_response();
        assert!(layer.apply(&request(Some("gzip")), &mut first));
        let first_payload = first.take_body().collect().await.unwrap();

        // second hit is served from the cache as a stream
        let mut second = large_text_response();
        assert!(layer.apply(&request(Some("gzip")), &mut second));
        assert!(matches!(second.body(), Body::Stream(_)));
        assert_eq!(second.content_encoding(), Some("gzip"));

        let second_payload = second.take_body().collect().await.unwrap();
        assert_eq!(first_payload, second_payload);
    }

    #[tokio::test]
    async fn test_cache_keys_differ_per_encoding() {
        let layer = caching_layer();

        let mut gz = large_text_response();
        layer.apply(&request(Some("gzip")), &mut gz);

        // a brotli-only client must not get the gzip payload
        let mut br = large_text_response();
        layer.apply(&request(Some("br")), &mut br);
        assert_eq!(br.content_encoding(), Some("br"));

        let payload = br.take_body().collect().await.unwrap();
        let original = large_text_response().take_body().collect().await.unwrap();
        assert_eq!(unbrotli(&payload), original.as_ref());
    }

    #[tokio::test]
    async fn test_stream_capture_populates_cache() {
        let layer = caching_layer();

        let data = b"capture this streamed payload ".repeat(50);
        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(64)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let mut res = Response::builder()
            .content_type("text/plain")
            .body(Body::stream(Box::pin(stream::iter(chunks))))
            .build();

        assert!(layer.apply(&request(Some("gzip")), &mut res));

        // drain the stream; completion commits the payload
        let mut out = BytesMut::new();
        let Body::Stream(mut s) = res.take_body() else {
            panic!("expected stream body");
        };
        while let Some(chunk) = s.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }

        // next request replays without recompressing
        let mut second = Response::builder()
            .content_type("text/plain")
            .body(Body::stream(Box::pin(stream::iter(Vec::<
                std::io::Result<Bytes>,
            >::new()))))
            .build();
        assert!(layer.apply(&request(Some("gzip")), &mut second));
        let replayed = second.take_body().collect().await.unwrap();
        assert_eq!(replayed, out.freeze());
    }

    #[test]
    fn test_no_capture_without_predicate() {
        let layer = Compress::new(CompressConfig::new().cache(CacheConfig::new())).unwrap();
        let mut res = large_text_response();
        assert!(layer.apply(&request(Some("gzip")), &mut res));

        // default predicate never captures; second response recompresses
        let mut second = large_text_response();
        assert!(layer.apply(&request(Some("gzip")), &mut second));
        assert!(matches!(second.body(), Body::Bytes(_)));
    }

    #[test]
    fn test_has_no_transform() {
        assert!(has_no_transform(Some("no-transform")));
        assert!(has_no_transform(Some("public , no-transform , max-age=3600")));
        assert!(!has_no_transform(Some("no-transform-x")));
        assert!(!has_no_transform(Some("public")));
        assert!(!has_no_transform(None));
    }
}
