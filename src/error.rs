//! Unified error type for the resolution core.

use thiserror::Error;

/// Unified error type for all resolver operations.
///
/// Most resolver operations are resilient by design: malformed input is
/// logged and skipped rather than propagated, and dependency resolution
/// itself always returns a value rather than failing (unresolved names are
/// returned as data, see [`crate::walker::fetch_unsatisfied`]). This type
/// exists for the handful of failure modes that do abort an operation.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// A stanza field could not be parsed (bad `Status`, bad `Conffiles`
    /// line, etc). The offending field is skipped; parsing of the stanza
    /// continues.
    #[error("malformed field {field:?} in stanza for {package:?}: {reason}")]
    ParseStanza {
        /// Name of the package the stanza belongs to, if known.
        package: String,
        /// Field name that failed to parse.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A dependency expression atom used an unrecognized operator or was
    /// missing a closing paren.
    #[error("malformed dependency atom {token:?}: {reason}")]
    ParseDepExpr {
        /// The offending token.
        token: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A stanza lacked a `Package:` name, or lacked both architecture and
    /// arch-priority.
    #[error("stanza missing identity: {0}")]
    MissingIdentity(String),

    /// A back-reference expected to exist in the catalog was missing.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// A feed file could not be read.
    #[error("I/O error reading feed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;
