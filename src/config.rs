//! Compression layer configuration.
//!
//! All knobs live on [`CompressConfig`], built fluently and validated when
//! the layer is constructed. Caching is opt-in via [`CacheConfig`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, MemoryStore};
use crate::core::Request;
use crate::encoding::{CodecOptions, Encoding};

/// Default minimum body size before compression kicks in.
pub const DEFAULT_THRESHOLD: usize = 1024;

/// Decides whether a response content type should be compressed.
pub type ContentTypeFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Decides whether a request's compressed payload should be captured.
pub type CapturePredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Derives the cache key for a request.
pub type KeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Derives the cache TTL for a request.
pub type TtlFn = Arc<dyn Fn(&Request) -> Option<Duration> + Send + Sync>;

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse a human-readable size.
    InvalidThreshold { value: String, error: String },
    /// An encoding token the layer does not support.
    UnknownEncoding { token: String },
    /// Every codec was disabled.
    NoEncodings,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidThreshold { value, error } => {
                write!(f, "invalid threshold '{}': {}", value, error)
            }
            ConfigError::UnknownEncoding { token } => {
                write!(f, "unknown content encoding: {}", token)
            }
            ConfigError::NoEncodings => {
                write!(f, "all content encodings are disabled")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings for the compression layer.
#[derive(Clone)]
pub struct CompressConfig {
    pub(crate) filter: ContentTypeFilter,
    pub(crate) threshold: usize,
    pub(crate) default_encoding: String,
    pub(crate) brotli: Option<CodecOptions>,
    pub(crate) gzip: Option<CodecOptions>,
    pub(crate) deflate: Option<CodecOptions>,
    pub(crate) cache: Option<CacheConfig>,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            filter: Arc::new(compressible),
            threshold: DEFAULT_THRESHOLD,
            default_encoding: "identity".to_string(),
            brotli: Some(Encoding::Brotli.default_options()),
            gzip: Some(Encoding::Gzip.default_options()),
            deflate: Some(Encoding::Deflate.default_options()),
            cache: None,
        }
    }
}

impl CompressConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content-type filter.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Minimum body size, in bytes. Bodies at or under the threshold are
    /// left uncompressed; zero compresses everything.
    pub fn threshold(mut self, bytes: usize) -> Self {
        self.threshold = bytes;
        self
    }

    /// Minimum body size as a human-readable string ("1kb", "2MB").
    pub fn threshold_str(mut self, value: &str) -> Result<Self, ConfigError> {
        self.threshold = parse_size(value).map_err(|error| ConfigError::InvalidThreshold {
            value: value.to_string(),
            error,
        })?;
        Ok(self)
    }

    /// Coding assumed when a request carries no Accept-Encoding header.
    ///
    /// `"identity"` (the default) leaves such responses uncompressed; `"*"`
    /// opts them into the server's preferred coding.
    pub fn default_encoding(mut self, token: &str) -> Self {
        self.default_encoding = token.to_string();
        self
    }

    /// Override brotli options, or disable brotli with `None`.
    pub fn brotli(mut self, opts: Option<CodecOptions>) -> Self {
        self.brotli = opts;
        self
    }

    /// Override gzip options, or disable gzip with `None`.
    pub fn gzip(mut self, opts: Option<CodecOptions>) -> Self {
        self.gzip = opts;
        self
    }

    /// Override deflate options, or disable deflate with `None`.
    pub fn deflate(mut self, opts: Option<CodecOptions>) -> Self {
        self.deflate = opts;
        self
    }

    /// Enable the compressed-payload cache.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Options for a coding, `None` when it is disabled.
    pub(crate) fn codec_options(&self, encoding: Encoding) -> Option<CodecOptions> {
        match encoding {
            Encoding::Brotli => self.brotli,
            Encoding::Gzip => self.gzip,
            Encoding::Deflate => self.deflate,
        }
    }

    /// Server preference order restricted to enabled codings.
    pub(crate) fn enabled_encodings(&self) -> Vec<Encoding> {
        Encoding::PREFERRED
            .into_iter()
            .filter(|e| self.codec_options(*e).is_some())
            .collect()
    }
}

impl fmt::Debug for CompressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressConfig")
            .field("threshold", &self.threshold)
            .field("default_encoding", &self.default_encoding)
            .field("brotli", &self.brotli)
            .field("gzip", &self.gzip)
            .field("deflate", &self.deflate)
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

/// Settings for the compressed-payload cache.
#[derive(Clone)]
pub struct CacheConfig {
    pub(crate) capture: CapturePredicate,
    pub(crate) key: KeyFn,
    pub(crate) ttl: TtlFn,
    pub(crate) store: Arc<dyn CacheStore>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // caching is opt-in per request; never capture by default
            capture: Arc::new(|_| false),
            key: Arc::new(|req: &Request| req.uri().to_string()),
            ttl: Arc::new(|_| None),
            store: Arc::new(MemoryStore::new()),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Predicate deciding which requests get their payload captured.
    pub fn capture<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.capture = Arc::new(predicate);
        self
    }

    /// Cache key derivation. Defaults to the full request URI.
    pub fn key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Request) -> String + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    /// Per-request TTL. Defaults to no expiry.
    pub fn ttl<F>(mut self, ttl: F) -> Self
    where
        F: Fn(&Request) -> Option<Duration> + Send + Sync + 'static,
    {
        self.ttl = Arc::new(ttl);
        self
    }

    /// Fixed TTL for every captured payload.
    pub fn ttl_fixed(self, ttl: Duration) -> Self {
        self.ttl(move |_| Some(ttl))
    }

    /// Storage backend. Defaults to an unbounded in-memory store.
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = store;
        self
    }
}

/// Default content-type filter: text, JSON-ish, XML-ish, and common
/// compressible application types.
pub fn compressible(content_type: &str) -> bool {
    // strip parameters like "; charset=utf-8"
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.starts_with("text/")
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
        || matches!(
            mime.as_str(),
            "application/json"
                | "application/javascript"
                | "application/xml"
                | "application/xhtml+xml"
                | "application/rss+xml"
                | "application/atom+xml"
                | "image/svg+xml"
                | "application/wasm"
        )
}

/// Parse a human-readable size ("1kb", "2MB", "512").
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim().to_lowercase();

    if s.is_empty() {
        return Err("empty size".to_string());
    }

    let (num_str, multiplier) = if let Some(rest) = s.strip_suffix("kb") {
        (rest, 1024)
    } else if let Some(rest) = s.strip_suffix("mb") {
        (rest, 1024 * 1024)
    } else if let Some(rest) = s.strip_suffix("gb") {
        (rest, 1024 * 1024 * 1024)
    } else if let Some(rest) = s.strip_suffix('b') {
        (rest, 1)
    } else {
        (s.as_str(), 1)
    };

    let num: usize = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str.trim()))?;

    Ok(num * multiplier)
}
