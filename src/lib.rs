//! condenser - HTTP response compression with content negotiation and a
//! compressed-payload cache.
//!
//! The layer inspects a request/response pair, decides whether the body is
//! worth compressing, negotiates a content coding against the client's
//! `Accept-Encoding` header, and splices the codec into the body. Optionally
//! it captures the compressed bytes so identical requests replay them
//! without touching the codec again.
//!
//! # Features
//!
//! - **Content negotiation**: RFC 7231 quality weights, wildcard and
//!   identity handling, server preference tiebreaks
//! - **Three codings**: brotli, gzip, and deflate with per-coding options
//! - **Streaming**: bodies of unknown length are compressed chunk by chunk
//! - **Payload cache**: pluggable store, per-request keys and TTLs,
//!   passive capture that never delays the response
//! - **Fail-open**: codec or store trouble downgrades to an uncompressed
//!   response, never an error
//!
//! # Example
//!
//! ```rust,ignore
//! use condenser::{Compress, CompressConfig, Request, Response};
//!
//! let layer = Compress::new(CompressConfig::new().threshold(1024))?;
//!
//! // per response:
//! let compressed = layer.apply(&request, &mut response);
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cache;
pub mod compress;
pub mod config;
pub mod core;
pub mod encoding;
pub mod logging;
pub mod negotiate;

// Re-exports for convenience
pub use cache::{CacheStore, CompressedCache, LruStore, MemoryStore};
pub use compress::Compress;
pub use config::{CacheConfig, CompressConfig, ConfigError};
pub use crate::core::{Body, ByteStream, Request, Response, ResponseBuilder};
pub use encoding::{CodecOptions, Encoding};
pub use negotiate::{AcceptEncoding, Negotiated};
