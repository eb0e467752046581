//! Incremental compression codecs.
//!
//! Each encoder consumes body chunks as they arrive and hands back whatever
//! compressed output the codec has produced so far, so a response can be
//! streamed without buffering it whole.

use std::io::{self, Write};

use bytes::Bytes;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use super::{CodecOptions, Encoding};

/// An incremental byte-stream compressor.
pub trait Encoder: Send {
    /// Feed a chunk of uncompressed input.
    fn write(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Drain the compressed output produced so far.
    ///
    /// May return an empty buffer while the codec is still accumulating.
    fn take(&mut self) -> io::Result<Bytes>;

    /// Finalize the compressed stream and return the remaining output.
    fn finish(self: Box<Self>) -> io::Result<Bytes>;
}

/// Construct the encoder for a negotiated coding.
pub fn for_encoding(encoding: Encoding, opts: CodecOptions) -> Box<dyn Encoder> {
    match encoding {
        Encoding::Gzip => Box::new(GzipStreamEncoder::new(opts.level)),
        Encoding::Deflate => Box::new(DeflateStreamEncoder::new(opts.level)),
        Encoding::Brotli => Box::new(BrotliStreamEncoder::new(opts.level, opts.window)),
    }
}

/// One-shot compression of a full buffer.
pub fn compress_bytes(data: &[u8], encoding: Encoding, opts: CodecOptions) -> io::Result<Bytes> {
    let mut encoder = for_encoding(encoding, opts);
    encoder.write(data)?;
    encoder.finish()
}

struct GzipStreamEncoder {
    inner: GzEncoder<Vec<u8>>,
}

impl GzipStreamEncoder {
    fn new(level: u32) -> Self {
        Self {
            inner: GzEncoder::new(Vec::new(), Compression::new(level.min(9))),
        }
    }
}

impl Encoder for GzipStreamEncoder {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.write_all(chunk)
    }

    fn take(&mut self) -> io::Result<Bytes> {
        Ok(Bytes::from(std::mem::take(self.inner.get_mut())))
    }

    fn finish(self: Box<Self>) -> io::Result<Bytes> {
        self.inner.finish().map(Bytes::from)
    }
}

struct DeflateStreamEncoder {
    inner: ZlibEncoder<Vec<u8>>,
}

impl DeflateStreamEncoder {
    fn new(level: u32) -> Self {
        Self {
            inner: ZlibEncoder::new(Vec::new(), Compression::new(level.min(9))),
        }
    }
}

impl Encoder for DeflateStreamEncoder {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.write_all(chunk)
    }

    fn take(&mut self) -> io::Result<Bytes> {
        Ok(Bytes::from(std::mem::take(self.inner.get_mut())))
    }

    fn finish(self: Box<Self>) -> io::Result<Bytes> {
        self.inner.finish().map(Bytes::from)
    }
}

/// Brotli input buffer size for the writer.
const BROTLI_BUFFER: usize = 4096;

struct BrotliStreamEncoder {
    inner: brotli::CompressorWriter<Vec<u8>>,
}

impl BrotliStreamEncoder {
    fn new(quality: u32, window: u32) -> Self {
        Self {
            inner: brotli::CompressorWriter::new(
                Vec::new(),
                BROTLI_BUFFER,
                quality.min(11),
                window.clamp(10, 24),
            ),
        }
    }
}

impl Encoder for BrotliStreamEncoder {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.write_all(chunk)
    }

    fn take(&mut self) -> io::Result<Bytes> {
        // brotli holds input until flushed
        self.inner.flush()?;
        Ok(Bytes::from(std::mem::take(self.inner.get_mut())))
    }

    fn finish(self: Box<Self>) -> io::Result<Bytes> {
        Ok(Bytes::from(self.inner.into_inner()))
    }
}
