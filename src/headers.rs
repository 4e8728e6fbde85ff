//! The stored-header shape shared by requests and responses, plus the
//! explicit, version-tagged wire format for a metadata entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `x-status`: the response's numeric HTTP status, stored as a header so it
/// round-trips through the same map as everything else.
pub const STATUS_HEADER: &str = "x-status";
/// `x-content-digest`: the entity key of the response body.
pub const CONTENT_DIGEST_HEADER: &str = "x-content-digest";
/// `x-body-file`: injected on reconstruction, names the resolved body path.
pub const BODY_FILE_HEADER: &str = "x-body-file";
/// Header stripped at persist time; a cache never stores computed age.
pub const AGE_HEADER: &str = "age";
/// Vary header name.
pub const VARY_HEADER: &str = "vary";

/// A header-name -> ordered-list-of-values mapping. Names are lowercase.
/// Ordered by name (a `BTreeMap`) so the wire format is deterministic; the
/// list of values under a name preserves the order values were inserted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeaders(pub BTreeMap<String, Vec<String>>);

impl StoredHeaders {
    /// Builds an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values stored under `name`, or `None` if the header is absent.
    /// `name` is lowercased before lookup.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&name.to_ascii_lowercase()).map(Vec::as_slice)
    }

    /// The first value stored under `name`, if any.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Replaces all values stored under `name` (lowercased) with `values`.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        self.0.insert(name.to_ascii_lowercase(), values);
    }

    /// Replaces all values stored under `name` with the single value `value`.
    pub fn set_one(&mut self, name: &str, value: impl Into<String>) {
        self.set(name, vec![value.into()]);
    }

    /// Removes `name` (lowercased) entirely.
    pub fn remove(&mut self, name: &str) {
        self.0.remove(&name.to_ascii_lowercase());
    }

    /// Iterates over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// A stored request: the live request's full header set at write time.
pub type StoredRequest = StoredHeaders;

/// A stored response: headers plus the derived `x-content-digest`/`x-status`
/// fields, which live in the same map.
pub type StoredResponse = StoredHeaders;

impl StoredResponse {
    /// The response's content digest (`x-content-digest`), if set.
    pub fn content_digest(&self) -> Option<&str> {
        self.get_first(CONTENT_DIGEST_HEADER)
    }

    /// The response's numeric status code, if `x-status` is present and
    /// parses as `u16`.
    pub fn status(&self) -> Option<u16> {
        self.get_first(STATUS_HEADER)?.parse().ok()
    }

    /// The response's `Vary` header value, or `""` if absent.
    pub fn vary(&self) -> &str {
        self.get_first(VARY_HEADER).unwrap_or("")
    }
}

/// One `(stored request headers, stored response headers)` pair under a
/// cache key, selected at lookup time by Vary matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Headers of the request that produced this variant.
    pub request: StoredRequest,
    /// Headers (plus `x-status`/`x-content-digest`) of the stored response.
    pub response: StoredResponse,
}

/// Current metadata wire-format version. Bump this when
/// [`MetadataEntry`]'s shape changes incompatibly; an unrecognized version
/// is treated identically to a deserialization failure, collapsing to "no
/// metadata".
pub const METADATA_FORMAT_VERSION: u8 = 1;

/// The full, ordered list of variants for one cache key. MRU-first: index 0
/// is the most recently written variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Wire-format version this entry was written with.
    pub format_version: u8,
    /// Variants, most-recently-written first.
    pub variants: Vec<Variant>,
}

impl MetadataEntry {
    /// Builds a metadata entry stamped with the current format version.
    pub fn new(variants: Vec<Variant>) -> Self {
        Self { format_version: METADATA_FORMAT_VERSION, variants }
    }

    /// Serializes this entry with the explicit wire format (postcard).
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Deserializes a metadata entry, treating an unrecognized
    /// `format_version` the same as any other corrupt-metadata failure: the
    /// caller collapses both to "no metadata" (see `MetadataStore::load`).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let entry: Self = postcard::from_bytes(bytes).ok()?;
        if entry.format_version != METADATA_FORMAT_VERSION {
            return None;
        }
        Some(entry)
    }
}
