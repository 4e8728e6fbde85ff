use miette::Diagnostic;
use thiserror::Error;

/// A `Result` typedef to use with the [`CacheError`] type.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised by the cache store.
///
/// `NotFound`, lock contention, and corrupt metadata are deliberately *not*
/// represented here - the facade reports those as `None`/`false`/empty
/// results rather than errors, matching the soft-failure policy in the
/// design notes.
#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    /// A filesystem operation failed (create_dir_all, write, rename, read).
    #[error("storage I/O error at {path}: {source}")]
    #[diagnostic(code(http_cache_store::io))]
    Io {
        /// Path the failing operation targeted.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The write-then-read-back verification in the atomic writer found a
    /// mismatch between the bytes written and the bytes read back.
    #[error("write verification failed for {path}: read back {read} bytes, wrote {wrote}")]
    #[diagnostic(code(http_cache_store::verification_mismatch))]
    VerificationMismatch {
        /// Path of the entry being verified.
        path: std::path::PathBuf,
        /// Number of bytes written.
        wrote: usize,
        /// Number of bytes read back.
        read: usize,
    },
    /// Serializing a metadata entry failed.
    #[error("failed to encode metadata: {0}")]
    #[diagnostic(code(http_cache_store::encode))]
    Encode(#[from] postcard::Error),
}
