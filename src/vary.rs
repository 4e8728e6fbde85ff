//! RFC-style "selected header" Vary matching.

use crate::headers::StoredHeaders;

/// Splits a `Vary` header value into the header names it selects, lowercased
/// and with `_` canonicalized to `-` (accommodates request abstractions that
/// surface headers with underscore names instead of hyphens).
fn vary_names(vary: &str) -> Vec<String> {
    vary.split([' ', ',', '\t'])
        .filter(|s| !s.is_empty())
        .map(|name| name.to_ascii_lowercase().replace('_', "-"))
        .collect()
}

/// Returns whether `env_a` and `env_b` agree on every header named in
/// `vary`. An empty `vary` always matches. Both environments missing the
/// same header also counts as a match.
pub fn requests_match(vary: &str, env_a: &StoredHeaders, env_b: &StoredHeaders) -> bool {
    let names = vary_names(vary);
    if names.is_empty() {
        return true;
    }
    names.iter().all(|name| env_a.get(name) == env_b.get(name))
}
