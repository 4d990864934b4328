use thiserror::Error;

/// AuthorizeError
///
/// The faults that may cross the authorization boundary. Everything the pipeline
/// can recover from locally (no current user, insufficient rights, a missing menu
/// node) is an `AuthorizationOutcome`, not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizeError {
    /// An explicit permission marker was declared with an empty flag.
    #[error("permission marker requires a non-empty flag")]
    InvalidPermission,

    /// The menu store could not be read or written.
    #[error("menu store unavailable: {0}")]
    Store(String),

    /// Registration of a controller namespace failed midway.
    #[error("catalog scan of namespace `{namespace}` failed: {reason}")]
    Scan { namespace: String, reason: String },

    /// A required configuration value was missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type AuthorizeResult<T> = Result<T, AuthorizeError>;
