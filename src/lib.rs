//! A persistent, content-addressed HTTP cache store.
//!
//! Given a request, [`CacheStore::lookup`] returns a previously stored
//! response (or `None`); given a request/response pair,
//! [`CacheStore::write`] persists the pair so subsequent equivalent
//! requests can be served. The store honors HTTP `Vary` semantics (multiple
//! response variants per URL), deduplicates response bodies by content
//! digest, coordinates concurrent cache fills through per-key advisory
//! locks, marks entries stale on invalidation, and garbage-collects stale
//! metadata and orphan bodies via [`CacheStore::clear`].
//!
//! This crate is the storage tier only. Freshness calculation, request
//! matching against an origin, transport, and TLS are the surrounding HTTP
//! cache kernel's job; this store consumes that kernel's request/response
//! types through the [`CacheRequest`]/[`CacheResponse`]/[`FreshnessPolicy`]
//! traits in [`request`] rather than assuming any one HTTP client.
//!
//! ## On-disk layout
//!
//! Under a configured root:
//!
//! - Metadata files at `md/{aa}/{bb}/{cc}/{rest}`.
//! - Entity blobs at `en/{aa}/{bb}/{cc}/{rest}`.
//! - Lock files: the metadata path plus `.lck`.
//!
//! ## Example
//!
//! ```no_run
//! use http_cache_store::{CacheStore, CacheStoreOptions};
//!
//! let store = CacheStore::new(CacheStoreOptions::new("./http-cache-store"));
//! ```
#![forbid(unsafe_code, future_incompatible)]
#![deny(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    nonstandard_style,
    unused_qualifications,
    unused_import_braces,
    unused_extern_crates,
    trivial_casts,
    trivial_numeric_casts
)]

mod atomic;
mod entity;
mod error;
mod headers;
mod key;
mod lock;
mod metadata;
mod path;
mod request;
mod sweeper;
mod vary;

use std::collections::HashSet;
use std::path::PathBuf;

pub use error::{CacheError, Result};
pub use headers::{StoredHeaders, StoredRequest, StoredResponse, Variant};
pub use key::KeyCache;
pub use lock::LockOutcome;
pub use request::{CacheRequest, CacheResponse, CachedResponse, FreshnessPolicy, ServerEnv};

use entity::EntityStore;
use headers::{
    MetadataEntry, BODY_FILE_HEADER, CONTENT_DIGEST_HEADER, STATUS_HEADER, VARY_HEADER,
};
use lock::LockRegistry;
use metadata::MetadataStore;

const LOCATION_HEADER: &str = "location";
const CONTENT_LOCATION_HEADER: &str = "content-location";
const TRANSFER_ENCODING_HEADER: &str = "transfer-encoding";
const CONTENT_LENGTH_HEADER: &str = "content-length";

/// Configuration for a [`CacheStore`].
///
/// A small, explicit options struct handed to the store at construction
/// time rather than environment parsing or a config file - the store is a
/// library, its host process owns configuration.
#[derive(Debug, Clone)]
pub struct CacheStoreOptions {
    /// Root directory the store is mounted under. `md/`, `en/`, and lock
    /// files all live beneath this path.
    pub root: PathBuf,
}

impl CacheStoreOptions {
    /// Builds options rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for CacheStoreOptions {
    fn default() -> Self {
        Self { root: PathBuf::from("./http-cache-store") }
    }
}

/// The cache facade: `lookup`, `write`, `invalidate`, `purge`, `lock`,
/// `unlock`, `isLocked`, `cleanup`, `clear`, plus the path encoder's
/// `getPath`/`getKeyByPath`.
///
/// All per-instance state (the key memoization cache, the set of locks this
/// process owns) lives on this struct rather than behind a global, so
/// multiple stores in one process never share state.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    entity: EntityStore,
    metadata: MetadataStore,
    locks: LockRegistry,
    keys: KeyCache,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheStoreOptions::default())
    }
}

impl CacheStore {
    /// Builds a store rooted at `options.root`. Does not touch the
    /// filesystem; directories are created lazily on first write.
    pub fn new(options: CacheStoreOptions) -> Self {
        Self {
            entity: EntityStore::new(options.root.clone()),
            metadata: MetadataStore::new(options.root.clone()),
            locks: LockRegistry::new(),
            keys: KeyCache::new(),
            root: options.root,
        }
    }

    /// The cache key for `request`: `"md" + sha1(canonical URI)`, memoized
    /// per canonical URI for the lifetime of this store.
    pub fn cache_key<R: CacheRequest>(&self, request: &R) -> String {
        self.keys.get_or_compute(&request.canonical_uri())
    }

    /// The filesystem path a cache key resolves to (`getPath`).
    pub fn get_path(&self, key: &str) -> PathBuf {
        path::encode(&self.root, key)
    }

    /// Recovers the cache key a path was produced from (`getKeyByPath`),
    /// the inverse of [`CacheStore::get_path`]. `None` if `path` isn't
    /// under this store's root or doesn't have the expected shape.
    pub fn get_key_by_path(&self, file_path: &std::path::Path) -> Option<String> {
        path::decode(&self.root, file_path)
    }

    /// Looks up the response variant matching `request`, or `None` on a
    /// miss.
    ///
    /// A variant whose body is missing is dropped from the metadata list
    /// and the trimmed list is persisted before returning `None` - repaired
    /// eagerly here rather than left for the sweeper to find later.
    pub fn lookup<R: CacheRequest>(&self, request: &R) -> Result<Option<CachedResponse>> {
        let key = self.cache_key(request);
        let Some(mut entry) = self.metadata.load(&key)? else {
            return Ok(None);
        };

        let live_headers = request.headers();
        let position = entry
            .variants
            .iter()
            .position(|v| vary::requests_match(v.response.vary(), &live_headers, &v.request));

        let Some(position) = position else {
            return Ok(None);
        };

        let content_digest =
            entry.variants[position].response.content_digest().map(str::to_owned);
        let digest = match content_digest {
            Some(d) => d,
            None => {
                log::warn!("variant at {key} has no x-content-digest; dropping it");
                entry.variants.remove(position);
                self.metadata.store(&key, &entry)?;
                return Ok(None);
            }
        };

        let body_path = self.entity.path(&digest);
        let body = match self.entity.load(&digest)? {
            Some(body) => body,
            None => {
                log::warn!(
                    "entity {digest} referenced by {key} is missing; dropping the variant"
                );
                entry.variants.remove(position);
                self.metadata.store(&key, &entry)?;
                return Ok(None);
            }
        };

        let mut headers = entry.variants[position].response.clone();
        let status = headers.status().unwrap_or(200);
        headers.remove(STATUS_HEADER);
        headers.set_one(BODY_FILE_HEADER, body_path.display().to_string());

        Ok(Some(CachedResponse { status, headers, body_path, body }))
    }

    /// Persists `(request, response)` as the new head-of-list variant for
    /// its cache key, returning the key. Computes and persists the
    /// response's content digest if it doesn't already carry one, then
    /// prepends the new variant to the retained list, dropping any prior
    /// variant that is "the same identity under the new Vary".
    pub fn write<R: CacheRequest, S: CacheResponse>(
        &self,
        request: &R,
        response: &S,
    ) -> Result<String> {
        let key = self.cache_key(request);
        let env = request.headers();

        let body = response.body();
        let digest = self.entity.save(body)?;

        let mut persisted = response.headers();
        persisted.remove(headers::AGE_HEADER);
        persisted.set_one(STATUS_HEADER, response.status().to_string());
        persisted.set_one(CONTENT_DIGEST_HEADER, digest);
        if persisted.get(TRANSFER_ENCODING_HEADER).is_none() {
            persisted.set_one(CONTENT_LENGTH_HEADER, body.len().to_string());
        }

        if log::log_enabled!(log::Level::Debug) {
            let names: Vec<&str> = persisted.iter().map(|(name, _)| name.as_str()).collect();
            log::debug!("write: key={key} headers={names:?}");
        }

        let vary_new = persisted.vary().to_owned();
        let mut retained: Vec<Variant> = self
            .metadata
            .load(&key)?
            .map(|entry| entry.variants)
            .unwrap_or_default()
            .into_iter()
            .filter(|variant| {
                !(variant.response.vary() == vary_new
                    && vary::requests_match(&vary_new, &variant.request, &env))
            })
            .collect();

        retained.insert(0, Variant { request: env, response: persisted });
        self.metadata.store(&key, &MetadataEntry::new(retained))?;
        Ok(key)
    }

    /// Expires every currently-fresh variant for `request`'s URL, then
    /// recurses into any `Location`/`Content-Location` header values on the
    /// *original* request, each as a synthetic GET. Recursion is bounded by
    /// a per-call visited set, so a cycle through those headers terminates
    /// instead of recursing forever.
    pub fn invalidate<R: CacheRequest, F: FreshnessPolicy>(
        &self,
        request: &R,
        freshness: &F,
    ) -> Result<()> {
        let mut visited = HashSet::new();
        self.invalidate_inner(request, freshness, &mut visited)
    }

    fn invalidate_inner<R: CacheRequest, F: FreshnessPolicy>(
        &self,
        request: &R,
        freshness: &F,
        visited: &mut HashSet<String>,
    ) -> Result<()> {
        let key = self.cache_key(request);
        if !visited.insert(key.clone()) {
            return Ok(());
        }

        if let Some(mut entry) = self.metadata.load(&key)? {
            let mut changed = false;
            for variant in entry.variants.iter_mut() {
                if freshness.is_fresh(&variant.response) {
                    freshness.expire(&mut variant.response);
                    changed = true;
                }
            }
            if changed {
                self.metadata.store(&key, &entry)?;
            }
        }

        let live_headers = request.headers();
        let server_env = request.server_env();
        for header in [LOCATION_HEADER, CONTENT_LOCATION_HEADER] {
            let Some(values) = live_headers.get(header) else { continue };
            for uri in values.to_vec() {
                let synthetic = R::synthetic_get(&uri, server_env.clone());
                self.invalidate_inner(&synthetic, freshness, visited)?;
            }
        }
        Ok(())
    }

    /// Unlinks the metadata file for a synthetic GET to `url`, if present,
    /// and reports whether a file was actually removed. Does not touch
    /// entity blobs or locks. Builds the synthetic GET through `R` and
    /// hashes it via [`CacheStore::cache_key`], the same as every other
    /// facade method and the recursive-invalidation path - so `purge(url)`
    /// always agrees with whatever `write`/`lookup` hashed for the same
    /// logical resource, even when `R::canonical_uri` normalizes `url` in
    /// ways a bare string comparison would not.
    pub fn purge<R: CacheRequest>(&self, url: &str, server_env: ServerEnv) -> bool {
        let synthetic = R::synthetic_get(url, server_env);
        let key = self.cache_key(&synthetic);
        self.metadata.remove(&key)
    }

    /// Attempts to exclusively create the lock file for `request`'s cache
    /// key.
    pub fn lock<R: CacheRequest>(&self, request: &R) -> Result<LockOutcome> {
        let key = self.cache_key(request);
        self.locks.lock(&self.root, &key)
    }

    /// Releases the lock for `request`'s cache key. Returns whether a file
    /// was actually removed.
    pub fn unlock<R: CacheRequest>(&self, request: &R) -> bool {
        let key = self.cache_key(request);
        self.locks.unlock(&self.root, &key)
    }

    /// Returns whether `request`'s cache key is currently locked.
    pub fn is_locked<R: CacheRequest>(&self, request: &R) -> bool {
        let key = self.cache_key(request);
        self.locks.is_locked(&self.root, &key)
    }

    /// Releases every lock this process owns, best-effort. Does not run
    /// the sweeper - `clear` is a separate, manual operation.
    pub fn cleanup(&self) {
        self.locks.cleanup();
    }

    /// Runs the two-phase sweeper and returns the number of files deleted
    /// (metadata entries plus orphan entity blobs).
    pub fn clear<F: FreshnessPolicy>(&self, freshness: &F) -> Result<usize> {
        sweeper::sweep(&self.root, &self.metadata, &self.entity, freshness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    struct TestRequest {
        uri: String,
        headers: StoredHeaders,
    }

    impl TestRequest {
        fn new(uri: &str) -> Self {
            Self { uri: uri.to_owned(), headers: StoredHeaders::new() }
        }

        fn header(mut self, name: &str, value: &str) -> Self {
            self.headers.set(name, vec![value.to_owned()]);
            self
        }
    }

    impl CacheRequest for TestRequest {
        fn canonical_uri(&self) -> String {
            self.uri.clone()
        }

        fn headers(&self) -> StoredHeaders {
            self.headers.clone()
        }

        fn server_env(&self) -> ServerEnv {
            Arc::new(())
        }

        fn synthetic_get(uri: &str, server_env: ServerEnv) -> Self {
            let _ = server_env;
            Self::new(uri)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct TestResponse {
        status: u16,
        headers: StoredHeaders,
        body: Vec<u8>,
    }

    impl TestResponse {
        fn new(status: u16, body: &[u8]) -> Self {
            Self { status, headers: StoredHeaders::new(), body: body.to_vec() }
        }

        fn header(mut self, name: &str, value: &str) -> Self {
            self.headers.set(name, vec![value.to_owned()]);
            self
        }
    }

    impl CacheResponse for TestResponse {
        fn status(&self) -> u16 {
            self.status
        }

        fn headers(&self) -> StoredHeaders {
            self.headers.clone()
        }

        fn body(&self) -> &[u8] {
            &self.body
        }
    }

    /// TTL-based freshness in whole seconds, measured against an injected
    /// clock rather than `SystemTime::now` so tests stay deterministic - a
    /// real host embeds a monotonic clock the same way.
    struct TtlFreshness {
        now: RefCell<u64>,
    }

    impl TtlFreshness {
        fn at(now: u64) -> Self {
            Self { now: RefCell::new(now) }
        }

        fn advance_to(&self, now: u64) {
            *self.now.borrow_mut() = now;
        }
    }

    impl FreshnessPolicy for TtlFreshness {
        fn is_fresh(&self, response: &StoredResponse) -> bool {
            let Some(expires_at) = response.get_first("x-expires-at").and_then(|v| v.parse::<u64>().ok())
            else {
                return false;
            };
            *self.now.borrow() < expires_at
        }

        fn expire(&self, response: &mut StoredResponse) {
            response.set_one("x-expires-at", "0");
        }
    }

    fn with_ttl(response: TestResponse, expires_at: u64) -> TestResponse {
        response.header("x-expires-at", &expires_at.to_string())
    }

    #[test]
    fn empty_lookup_returns_none_and_creates_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let request = TestRequest::new("http://example.com/nothing");
        assert!(store.lookup(&request)?.is_none());
        let mut count = 0;
        for entry in walkdir_shallow(dir.path()) {
            let _ = entry;
            count += 1;
        }
        assert_eq!(count, 0);
        Ok(())
    }

    fn walkdir_shallow(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        std::fs::read_dir(dir).map(|it| it.flatten().map(|e| e.path()).collect()).unwrap_or_default()
    }

    #[test]
    fn simple_store_and_lookup_round_trips() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let request = TestRequest::new("http://example.com/test");
        let response = TestResponse::new(200, b"test").header("cache-control", "max-age=420");

        store.write(&request, &response)?;

        let expected_digest = entity::digest_for(b"test");
        assert!(store.get_path(&expected_digest).is_file());

        let found = store.lookup(&request)?.expect("lookup hits");
        assert_eq!(found.status, 200);
        assert_eq!(found.body, b"test");
        assert_eq!(found.headers.get_first(CONTENT_DIGEST_HEADER), Some(expected_digest.as_str()));
        assert!(found.headers.get_first(BODY_FILE_HEADER).is_some());
        Ok(())
    }

    #[test]
    fn vary_mismatch_misses() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let write_req = TestRequest::new("http://example.com/test")
            .header("foo", "Foo")
            .header("bar", "Bar");
        let response =
            TestResponse::new(200, b"test").header(VARY_HEADER, "Foo Bar");
        store.write(&write_req, &response)?;

        let lookup_req = TestRequest::new("http://example.com/test")
            .header("foo", "Bling")
            .header("bar", "Bam");
        assert!(store.lookup(&lookup_req)?.is_none());
        Ok(())
    }

    #[test]
    fn three_distinct_variants_are_all_retained_and_individually_addressable(
    ) -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let pairs = [("a", "1"), ("b", "2"), ("c", "3")];
        for (i, (foo, bar)) in pairs.iter().enumerate() {
            let req = TestRequest::new("http://example.com/test")
                .header("foo", foo)
                .header("bar", bar);
            let body = format!("test {i}");
            let res = TestResponse::new(200, body.as_bytes()).header(VARY_HEADER, "Foo Bar");
            store.write(&req, &res)?;
        }

        for (i, (foo, bar)) in pairs.iter().enumerate() {
            let req = TestRequest::new("http://example.com/test")
                .header("foo", foo)
                .header("bar", bar);
            let found = store.lookup(&req)?.expect("hits its own variant");
            assert_eq!(found.body, format!("test {i}").into_bytes());
        }
        Ok(())
    }

    #[test]
    fn rewriting_the_same_vary_identity_overwrites_rather_than_growing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let pairs = [("a", "1"), ("b", "2"), ("a", "1")];
        for (i, (foo, bar)) in pairs.iter().enumerate() {
            let req = TestRequest::new("http://example.com/test")
                .header("foo", foo)
                .header("bar", bar);
            let body = format!("test {i}");
            let res = TestResponse::new(200, body.as_bytes()).header(VARY_HEADER, "Foo Bar");
            store.write(&req, &res)?;
        }

        let req = TestRequest::new("http://example.com/test").header("foo", "a").header("bar", "1");
        let found = store.lookup(&req)?.expect("hits the overwritten variant");
        // the third write (index 2) superseded the first (index 0); its
        // body must win.
        assert_eq!(found.body, b"test 2");
        Ok(())
    }

    #[test]
    fn clear_removes_one_stale_variant_and_keeps_the_shared_entity() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let freshness = TtlFreshness::at(0);

        let fresh_a = TestRequest::new("http://example.com/test").header("foo", "a");
        let fresh_b = TestRequest::new("http://example.com/test").header("foo", "b");
        let stale = TestRequest::new("http://example.com/test").header("foo", "c");

        store.write(
            &fresh_a,
            &with_ttl(TestResponse::new(200, b"fresh a").header(VARY_HEADER, "Foo"), 100),
        )?;
        store.write(
            &fresh_b,
            &with_ttl(TestResponse::new(200, b"fresh b").header(VARY_HEADER, "Foo"), 100),
        )?;
        store.write(
            &stale,
            &with_ttl(TestResponse::new(200, b"fresh a").header(VARY_HEADER, "Foo"), 0),
        )?;

        let deleted = store.clear(&freshness)?;
        assert_eq!(deleted, 1);

        assert!(store.lookup(&fresh_a)?.is_some());
        assert!(store.lookup(&fresh_b)?.is_some());
        assert!(store.lookup(&stale)?.is_none());
        Ok(())
    }

    #[test]
    fn clear_after_invalidate_removes_metadata_and_its_orphan_body() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let freshness = TtlFreshness::at(0);
        let request = TestRequest::new("http://example.com/test");

        store.write(&request, &with_ttl(TestResponse::new(200, b"test"), 100))?;
        store.invalidate(&request, &freshness)?;
        let deleted = store.clear(&freshness)?;
        assert_eq!(deleted, 2);

        let key = store.cache_key(&request);
        assert!(!store.get_path(&key).is_file());
        let digest = entity::digest_for(b"test");
        assert!(!store.get_path(&digest).is_file());
        Ok(())
    }

    #[test]
    fn invalidate_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let freshness = TtlFreshness::at(0);
        let request = TestRequest::new("http://example.com/test");
        store.write(&request, &with_ttl(TestResponse::new(200, b"test"), 100))?;

        store.invalidate(&request, &freshness)?;
        let key = store.cache_key(&request);
        let after_first = store.get_path(&key);
        let bytes_first = std::fs::read(&after_first)?;

        store.invalidate(&request, &freshness)?;
        let bytes_second = std::fs::read(&after_first)?;
        assert_eq!(bytes_first, bytes_second);
        Ok(())
    }

    #[test]
    fn purge_removes_only_its_own_url() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let a = TestRequest::new("http://example.com/a");
        let b = TestRequest::new("http://example.com/b");
        store.write(&a, &TestResponse::new(200, b"a"))?;
        store.write(&b, &TestResponse::new(200, b"b"))?;

        assert!(store.purge::<TestRequest>("http://example.com/a", Arc::new(())));
        assert!(store.lookup(&a)?.is_none());
        assert!(store.lookup(&b)?.is_some());
        Ok(())
    }

    /// A request whose `canonical_uri` reorders the query string the way
    /// spec-compliant canonicalization is allowed to - exercises that
    /// `purge` hashes through the same `CacheRequest::canonical_uri` that
    /// `write`/`lookup` used, rather than some independent normalization.
    #[derive(Debug, Clone, Default)]
    struct CanonicalizingRequest {
        raw_uri: String,
    }

    impl CanonicalizingRequest {
        fn new(raw_uri: &str) -> Self {
            Self { raw_uri: raw_uri.to_owned() }
        }

        fn canonicalize(raw_uri: &str) -> String {
            let Some((base, query)) = raw_uri.split_once('?') else {
                return raw_uri.to_owned();
            };
            let mut params: Vec<&str> = query.split('&').collect();
            params.sort_unstable();
            format!("{base}?{}", params.join("&"))
        }
    }

    impl CacheRequest for CanonicalizingRequest {
        fn canonical_uri(&self) -> String {
            Self::canonicalize(&self.raw_uri)
        }

        fn headers(&self) -> StoredHeaders {
            StoredHeaders::new()
        }

        fn server_env(&self) -> ServerEnv {
            Arc::new(())
        }

        fn synthetic_get(uri: &str, server_env: ServerEnv) -> Self {
            let _ = server_env;
            Self::new(uri)
        }
    }

    #[test]
    fn purge_uses_the_same_canonicalization_as_write_and_lookup() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let written = CanonicalizingRequest::new("http://example.com/test?b=2&a=1");
        store.write(&written, &TestResponse::new(200, b"test"))?;

        // differently-ordered query string, same logical resource.
        assert!(store.purge::<CanonicalizingRequest>(
            "http://example.com/test?a=1&b=2",
            Arc::new(())
        ));
        assert!(store.lookup(&written)?.is_none());
        Ok(())
    }

    #[test]
    fn lock_lifecycle_acquire_then_contend_then_release() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let request = TestRequest::new("http://example.com/test");

        assert_eq!(store.lock(&request)?, LockOutcome::Acquired);
        assert!(store.is_locked(&request));
        assert!(matches!(store.lock(&request)?, LockOutcome::HeldElsewhere(_)));
        assert!(store.unlock(&request));
        assert!(!store.is_locked(&request));
        Ok(())
    }

    #[test]
    fn invalidate_recurses_through_location_headers_and_terminates_on_a_cycle(
    ) -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let freshness = TtlFreshness::at(0);

        let a = TestRequest::new("http://example.com/a")
            .header(LOCATION_HEADER, "http://example.com/b");
        let b = TestRequest::new("http://example.com/b")
            .header(LOCATION_HEADER, "http://example.com/a");

        store.write(&a, &with_ttl(TestResponse::new(200, b"a"), 100))?;
        store.write(&b, &with_ttl(TestResponse::new(200, b"b"), 100))?;

        // must terminate despite a<->b cycling through Location.
        store.invalidate(&a, &freshness)?;

        assert!(!freshness_holds(&store, &a, &freshness));
        assert!(!freshness_holds(&store, &b, &freshness));
        Ok(())
    }

    fn freshness_holds<F: FreshnessPolicy>(
        store: &CacheStore,
        request: &TestRequest,
        freshness: &F,
    ) -> bool {
        let key = store.cache_key(request);
        let entry = store.metadata.load(&key).unwrap().unwrap();
        entry.variants.iter().all(|v| !freshness.is_fresh(&v.response))
    }

    #[test]
    fn ttl_freshness_reports_stale_once_the_clock_passes_expiry() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = CacheStore::new(CacheStoreOptions::new(dir.path()));
        let freshness = TtlFreshness::at(0);
        let request = TestRequest::new("http://example.com/ttl");
        store.write(&request, &with_ttl(TestResponse::new(200, b"ttl"), 10))?;

        assert!(freshness.is_fresh(
            &store.metadata.load(&store.cache_key(&request))?.unwrap().variants[0].response
        ));
        freshness.advance_to(20);
        assert!(!freshness.is_fresh(
            &store.metadata.load(&store.cache_key(&request))?.unwrap().variants[0].response
        ));
        Ok(())
    }
}
