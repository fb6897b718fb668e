//! Domain-specific error types for the reconciliation engine.
//!
//! Typed errors are returned at the seams callers match on (module
//! resolution, remote fetches, pipeline conflicts, planning).  Command
//! handlers and internal plumbing use [`anyhow::Error`] and convert these
//! via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! WorkspacedError
//! ├── Module(ModError)         source grammar, providers, lockfile enforcement
//! ├── Fetch(FetchError)        downloads, hash verification, extraction
//! ├── Pipeline(PipelineError)  module failures, duplicate targets
//! └── Plan(PlanError)          cancellation, unreadable targets
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum WorkspacedError {
    /// Module or source resolution failed.
    #[error(transparent)]
    Module(#[from] ModError),

    /// A remote fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The source pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Planning failed.
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Configuration errors raised while resolving module and source specs.
///
/// These are never retried: the user has to fix the configuration (or
/// re-lock) before the operation can succeed.
#[derive(Error, Debug)]
pub enum ModError {
    /// The spec string does not follow `provider:ref[@version]`.
    #[error("invalid source spec '{spec}': {reason}")]
    InvalidSpec {
        /// The offending spec string.
        spec: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The provider is neither built in nor a mod-file alias.
    #[error("unknown provider '{provider}' in '{spec}'")]
    UnknownProvider {
        /// Provider name that failed to resolve.
        provider: String,
        /// Full spec string.
        spec: String,
    },

    /// A provider-specific field is missing.
    #[error("source '{alias}' is missing required field '{field}'")]
    MissingField {
        /// Alias or module name.
        alias: String,
        /// Name of the missing field.
        field: String,
    },

    /// The freshly computed source does not match the lockfile.
    #[error(
        "'{name}' is locked to '{locked}' but resolves to '{computed}'; run `workspaced lock` to update"
    )]
    LockMismatch {
        /// Alias or module name.
        name: String,
        /// Source recorded in the lockfile.
        locked: String,
        /// Source computed from the current configuration.
        computed: String,
    },

    /// An explicit version conflicts with the locked one.
    #[error(
        "'{name}' requests version '{requested}' but the lockfile pins '{locked}'; run `workspaced lock` to update"
    )]
    VersionConflict {
        /// Alias or module name.
        name: String,
        /// Version pinned in the lockfile.
        locked: String,
        /// Version requested by the configuration.
        requested: String,
    },

    /// A version pin was given to a provider without versions.
    #[error("provider '{provider}' does not support versions (in '{spec}')")]
    VersionNotSupported {
        /// Provider that rejected the pin.
        provider: String,
        /// Full spec string.
        spec: String,
    },

    /// A module path does not exist inside its resolved source.
    #[error("module path not found: {}", path.display())]
    NotFound {
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// Fetching a remote source failed.
    #[error("failed to fetch '{name}'")]
    Fetch {
        /// Alias or module name.
        name: String,
        /// Underlying fetch failure.
        source: FetchError,
    },

    /// A mod-file, sum-file or manifest could not be read or parsed.
    #[error("failed to load {}: {message}", path.display())]
    Load {
        /// File that failed to load.
        path: PathBuf,
        /// Parser or I/O message.
        message: String,
    },
}

/// Errors raised by remote fetches and cache fills.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be completed.
    #[error("request to {url} failed: {message}")]
    Request {
        /// URL that was requested.
        url: String,
        /// Transport error message.
        message: String,
    },

    /// Every candidate URL failed; carries the last failure.
    #[error("all {tried} url(s) failed, last error: {last}")]
    Exhausted {
        /// Number of URLs attempted.
        tried: usize,
        /// The final error encountered.
        last: Box<Self>,
    },

    /// No candidate URLs were supplied.
    #[error("no urls to fetch")]
    NoUrls,

    /// The downloaded bytes did not match the expected digest.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Digest the caller expected.
        expected: String,
        /// Digest of the bytes received.
        actual: String,
    },

    /// The hash string names an algorithm that is not supported.
    #[error("unsupported hash '{0}'")]
    UnsupportedHash(String),

    /// A git reference could not be resolved to a commit.
    #[error("reference '{reference}' not found in {repo}")]
    RefNotFound {
        /// Repository (`owner/name`).
        repo: String,
        /// Reference that was requested.
        reference: String,
    },

    /// Listing remote references failed.
    #[error("failed to list references of {repo}")]
    Git {
        /// Repository (`owner/name`).
        repo: String,
        /// Underlying git error.
        source: git2::Error,
    },

    /// Archive extraction failed.
    #[error("failed to extract archive: {0}")]
    Extract(String),

    /// A local I/O operation failed.
    #[error("{context}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised by source pipeline plugins.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Two desired files resolve to the same target path.
    #[error("conflicting sources for {}: '{first}' and '{second}'", target.display())]
    Conflict {
        /// Absolute target path claimed twice.
        target: PathBuf,
        /// Provenance of the first claimant.
        first: String,
        /// Provenance of the second claimant.
        second: String,
    },

    /// A module failed to resolve.
    #[error("module '{module}'")]
    Module {
        /// Module name.
        module: String,
        /// Underlying failure.
        source: anyhow::Error,
    },
}

/// Errors raised while computing a plan.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The planning pass was cancelled before it completed.
    #[error("planning cancelled")]
    Cancelled,

    /// The worker pool could not be started.
    #[error("failed to start planner workers: {0}")]
    WorkerPool(String),

    /// Reading the desired content or the live file failed.
    #[error("failed to inspect {}", path.display())]
    Io {
        /// Target path being compared.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // ModError
    // -----------------------------------------------------------------------

    #[test]
    fn lock_mismatch_mentions_lock_command() {
        let e = ModError::LockMismatch {
            name: "dots".to_string(),
            locked: "github:me/dots".to_string(),
            computed: "github:me/other".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("github:me/dots"));
        assert!(msg.contains("github:me/other"));
        assert!(msg.contains("workspaced lock"));
    }

    #[test]
    fn version_not_supported_display() {
        let e = ModError::VersionNotSupported {
            provider: "local".to_string(),
            spec: "local:mods/foo@v1".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "provider 'local' does not support versions (in 'local:mods/foo@v1')"
        );
    }

    #[test]
    fn mod_fetch_error_has_source() {
        use std::error::Error as StdError;
        let e = ModError::Fetch {
            name: "dots".to_string(),
            source: FetchError::NoUrls,
        };
        assert!(e.source().is_some());
    }

    // -----------------------------------------------------------------------
    // FetchError
    // -----------------------------------------------------------------------

    #[test]
    fn hash_mismatch_display() {
        let e = FetchError::HashMismatch {
            expected: "sha256:aa".to_string(),
            actual: "sha256:bb".to_string(),
        };
        assert_eq!(e.to_string(), "hash mismatch: expected sha256:aa, got sha256:bb");
    }

    #[test]
    fn exhausted_wraps_last_error() {
        let e = FetchError::Exhausted {
            tried: 2,
            last: Box::new(FetchError::Request {
                url: "https://example.invalid/a".to_string(),
                message: "timed out".to_string(),
            }),
        };
        assert!(e.to_string().contains("all 2 url(s) failed"));
        assert!(e.to_string().contains("timed out"));
    }

    // -----------------------------------------------------------------------
    // PipelineError / PlanError
    // -----------------------------------------------------------------------

    #[test]
    fn conflict_names_both_sources() {
        let e = PipelineError::Conflict {
            target: PathBuf::from("/home/u/.bashrc"),
            first: "scan:bashrc".to_string(),
            second: "module:shell:bashrc".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/home/u/.bashrc"));
        assert!(msg.contains("scan:bashrc"));
        assert!(msg.contains("module:shell:bashrc"));
    }

    #[test]
    fn plan_io_has_source() {
        use std::error::Error as StdError;
        let e = PlanError::Io {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("/tmp/x"));
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    #[test]
    fn top_level_from_conversions() {
        let e: WorkspacedError = PlanError::Cancelled.into();
        assert_eq!(e.to_string(), "planning cancelled");
        let e: WorkspacedError = FetchError::NoUrls.into();
        assert!(matches!(e, WorkspacedError::Fetch(FetchError::NoUrls)));
    }

    #[test]
    fn chained_message_names_each_cause_once() {
        let e = anyhow::Error::from(ModError::Fetch {
            name: "nvim".to_string(),
            source: FetchError::RefNotFound {
                repo: "owner/nvim".to_string(),
                reference: "dev".to_string(),
            },
        });
        let msg = format!("{e:#}");
        assert_eq!(
            msg,
            "failed to fetch 'nvim': reference 'dev' not found in owner/nvim"
        );
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<WorkspacedError>();
        assert_send_sync::<ModError>();
        assert_send_sync::<FetchError>();
        assert_send_sync::<PipelineError>();
        assert_send_sync::<PlanError>();
    }

    #[test]
    fn converts_to_anyhow() {
        let e = ModError::MissingField {
            alias: "dots".to_string(),
            field: "repo".to_string(),
        };
        let _anyhow_err: anyhow::Error = e.into();
    }
}
