//! Compressed-payload cache.
//!
//! Stores fully-compressed response bodies so repeated requests skip the
//! codec entirely. Payloads enter the cache through a passive capture tap
//! wrapped around a compression stream; they leave as replayable byte
//! streams. Entries optionally expire on a per-insert TTL.

mod store;

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use tokio::runtime::Handle;

use crate::core::ByteStream;

pub use store::{CacheStore, LruStore, MemoryStore};

/// Cache of compressed response payloads.
///
/// Cheap to clone; all clones share the same backing store.
#[derive(Clone)]
pub struct CompressedCache {
    store: Arc<dyn CacheStore>,
}

impl CompressedCache {
    /// Cache backed by an unbounded in-memory store.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Cache backed by a caller-supplied store.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Whether a payload exists for this key.
    #[inline]
    pub fn has(&self, key: &str) -> bool {
        self.store.has(key)
    }

    /// Fetch the payload for a key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.store.get(key)
    }

    /// Store a payload, optionally expiring it after `ttl`.
    pub fn insert(&self, key: &str, payload: Bytes, ttl: Option<Duration>) {
        self.store.set(key, payload);
        if let Some(ttl) = ttl {
            self.schedule_expiry(key.to_string(), ttl);
        }
    }

    /// Remove a payload.
    #[inline]
    pub fn delete(&self, key: &str) {
        self.store.delete(key);
    }

    /// Arrange for `key` to be dropped after `ttl`.
    ///
    /// Expiry needs a running tokio runtime; without one the entry simply
    /// never expires, which only loses freshness, not correctness.
    fn schedule_expiry(&self, key: String, ttl: Duration) {
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!(key = %key, "no runtime, cache entry will not expire");
            return;
        };
        let store = Arc::clone(&self.store);
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            store.delete(&key);
            tracing::trace!(key = %key, "cache entry expired");
        });
    }

    /// Wrap `inner` in a passive capture tap.
    ///
    /// Chunks pass through unmodified. When the stream ends cleanly the
    /// accumulated payload is committed under `key`; an error discards the
    /// partial buffer so a truncated payload is never cached. The TTL clock
    /// starts at commit, not at first chunk.
    pub fn capture(&self, inner: ByteStream, key: String, ttl: Option<Duration>) -> ByteStream {
        Box::pin(Capture {
            inner: Some(inner),
            buf: BytesMut::new(),
            cache: self.clone(),
            key,
            ttl,
        })
    }

    /// Turn a cached payload into a body stream.
    ///
    /// Each call yields a fresh single-chunk stream, so one cached entry can
    /// serve any number of concurrent responses.
    pub fn replay(payload: Bytes) -> ByteStream {
        Box::pin(stream::iter(std::iter::once(Ok(payload))))
    }
}

impl std::fmt::Debug for CompressedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedCache").finish_non_exhaustive()
    }
}

/// Pass-through stream that records chunks and commits on clean completion.
struct Capture {
    inner: Option<ByteStream>,
    buf: BytesMut,
    cache: CompressedCache,
    key: String,
    ttl: Option<Duration>,
}

impl futures_util::Stream for Capture {
    type Item = std::io::Result<Bytes>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match std::task::ready!(inner.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                this.buf.extend_from_slice(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                // never commit a truncated payload
                this.inner = None;
                this.buf.clear();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.inner = None;
                let payload = std::mem::take(&mut this.buf).freeze();
                this.cache.insert(&this.key, payload, this.ttl);
                tracing::debug!(key = %this.key, "captured compressed payload");
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<io::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p)))
            .collect();
        Box::pin(stream::iter(items))
    }

    async fn drain(mut s: ByteStream) -> io::Result<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = s.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }

    #[tokio::test]
    async fn test_capture_commits_on_clean_end() {
        let cache = CompressedCache::in_memory();
        let tapped = cache.capture(chunks(&[b"abc", b"def"]), "k".into(), None);

        // chunks pass through unmodified
        let seen = drain(tapped).await.unwrap();
        assert_eq!(seen.as_ref(), b"abcdef");

        assert_eq!(cache.get("k").unwrap().as_ref(), b"abcdef");
    }

    #[tokio::test]
    async fn test_capture_discards_on_error() {
        let cache = CompressedCache::in_memory();
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "gone")),
        ];
        let tapped = cache.capture(Box::pin(stream::iter(items)), "k".into(), None);

        assert!(drain(tapped).await.is_err());
        assert!(!cache.has("k"));
    }

    #[tokio::test]
    async fn test_replay_is_repeatable() {
        let cache = CompressedCache::in_memory();
        cache.insert("k", Bytes::from_static(b"payload"), None);

        let payload = cache.get("k").unwrap();
        let first = drain(CompressedCache::replay(payload.clone())).await.unwrap();
        let second = drain(CompressedCache::replay(payload)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_ttl_expires_entry() {
        let cache = CompressedCache::in_memory();
        cache.insert("k", Bytes::from_static(b"x"), Some(Duration::from_millis(50)));

        assert!(cache.has("k"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!cache.has("k"));
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let cache = CompressedCache::in_memory();
        cache.insert("k", Bytes::from_static(b"x"), None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.has("k"));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = CompressedCache::in_memory();
        cache.insert("k", Bytes::from_static(b"x"), None);
        cache.delete("k");
        assert!(!cache.has("k"));
    }

    #[tokio::test]
    async fn test_ttl_starts_at_commit() {
        // a slow stream must not eat into the TTL before the payload lands
        let cache = CompressedCache::in_memory();
        let slow: ByteStream = Box::pin(
            stream::iter(vec![Ok(Bytes::from_static(b"late"))]).then(|item| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                item
            }),
        );
        let tapped = cache.capture(slow, "k".into(), Some(Duration::from_millis(80)));
        drain(tapped).await.unwrap();

        // well within the TTL measured from commit
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.has("k"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!cache.has("k"));
    }
}
