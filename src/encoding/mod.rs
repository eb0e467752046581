//! Content codings and their codec configuration.
//!
//! The negotiator works on [`Encoding`] tokens; the actual byte transforms
//! live in [`encoder`] and the streaming adapter in [`stream`].

mod encoder;
mod stream;

pub use encoder::{compress_bytes, for_encoding, Encoder};
pub use stream::CompressedStream;

/// A content coding the server can produce.
///
/// `identity` is deliberately not a variant: "send uncompressed" is a
/// negotiation outcome, not a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Brotli (`br`), best ratio on modern clients.
    Brotli,
    /// Gzip, most compatible.
    Gzip,
    /// Deflate (zlib-wrapped).
    Deflate,
}

impl Encoding {
    /// Server preference order, highest first.
    pub const PREFERRED: [Encoding; 3] = [Encoding::Brotli, Encoding::Gzip, Encoding::Deflate];

    /// The Content-Encoding / Accept-Encoding token.
    #[inline]
    pub fn token(&self) -> &'static str {
        match self {
            Encoding::Brotli => "br",
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
        }
    }

    /// Parse a coding token (case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "br" => Some(Encoding::Brotli),
            "gzip" => Some(Encoding::Gzip),
            "deflate" => Some(Encoding::Deflate),
            _ => None,
        }
    }

    /// Default codec options for this coding.
    pub fn default_options(&self) -> CodecOptions {
        match self {
            Encoding::Brotli => CodecOptions {
                level: BROTLI_QUALITY,
                window: BROTLI_WINDOW,
            },
            Encoding::Gzip | Encoding::Deflate => CodecOptions {
                level: FLATE_LEVEL,
                window: 0,
            },
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Brotli compression quality (0-11, higher = better compression but slower).
const BROTLI_QUALITY: u32 = 4;

/// Brotli compression window size (10-24, affects memory usage).
const BROTLI_WINDOW: u32 = 20;

/// Gzip/deflate compression level (1-9).
const FLATE_LEVEL: u32 = 6;

/// Codec configuration blob, opaque to negotiation.
///
/// `level` is the gzip/deflate level or the brotli quality; `window` is the
/// brotli lg(window) and is ignored by the flate codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Compression level (flate 1-9) or quality (brotli 0-11).
    pub level: u32,
    /// Brotli window size exponent (10-24); unused by gzip/deflate.
    pub window: u32,
}

impl CodecOptions {
    /// Options with a specific level and no window override.
    pub fn level(level: u32) -> Self {
        Self { level, window: 0 }
    }
}
