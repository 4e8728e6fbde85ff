//! The request/response/freshness abstractions the facade is generic over.
//!
//! The store never parses HTTP itself; it is handed whatever request and
//! response types the surrounding cache kernel already has, through these
//! three traits, named for what they provide rather than for any one HTTP
//! client or cache-control parser.

use std::sync::Arc;

use crate::headers::StoredHeaders;

/// Opaque passthrough for whatever server/request context a kernel wants to
/// carry across a recursive invalidation. The store never inspects it.
pub type ServerEnv = Arc<dyn std::any::Any + Send + Sync>;

/// A live HTTP request, as seen by the surrounding cache kernel.
pub trait CacheRequest {
    /// The canonicalized URI this request addresses - whatever the host
    /// request abstraction deems equal, including query-string ordering.
    /// Used to derive the cache key.
    fn canonical_uri(&self) -> String;

    /// The request's full header set, ordered value lists, lowercase names.
    /// Used both as the `StoredRequest` persisted with a write and as the
    /// live environment matched against stored requests under `Vary`.
    fn headers(&self) -> StoredHeaders;

    /// Opaque server/request context propagated into synthetic GETs built
    /// during recursive invalidation.
    fn server_env(&self) -> ServerEnv;

    /// Builds a synthetic GET request to `uri`, carrying `server_env`
    /// forward. Used only by `invalidate`'s `Location`/`Content-Location`
    /// recursion and by `purge`.
    fn synthetic_get(uri: &str, server_env: ServerEnv) -> Self
    where
        Self: Sized;
}

/// A live HTTP response, as seen by the surrounding cache kernel, being
/// written into the store.
pub trait CacheResponse {
    /// Numeric HTTP status code.
    fn status(&self) -> u16;

    /// The response's header set, ordered value lists, lowercase names.
    fn headers(&self) -> StoredHeaders;

    /// The complete response body. The store is a complete-blob cache, not
    /// a streaming one, so this is always the full body rather than a
    /// stream.
    fn body(&self) -> &[u8];
}

/// The freshness predicate consumed from outside the store. The store has
/// no notion of `max-age` or `Cache-Control`; it only asks this trait
/// whether a stored response is still servable, and asks it to mutate a
/// stored response so a later call reports stale.
pub trait FreshnessPolicy {
    /// Whether `response` (as currently stored) is still fresh.
    fn is_fresh(&self, response: &StoredHeaders) -> bool;

    /// Mutates `response` in place so a subsequent `is_fresh` call on the
    /// same headers reports `false`.
    fn expire(&self, response: &mut StoredHeaders);
}

/// A reconstructed response handed back from `lookup`.
///
/// Carries the stored headers (minus `x-status`, which becomes `status`)
/// plus an injected `x-body-file` header naming the resolved body path, and
/// the body bytes loaded eagerly - the store never streams.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The stored response's numeric HTTP status code (`x-status`).
    pub status: u16,
    /// Stored response headers, with `x-status` removed and `x-body-file`
    /// added; `x-content-digest` is retained.
    pub headers: StoredHeaders,
    /// Filesystem path of the resolved entity blob (same value as the
    /// injected `x-body-file` header).
    pub body_path: std::path::PathBuf,
    /// The body bytes loaded from `body_path`.
    pub body: Vec<u8>,
}
