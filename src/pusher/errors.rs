use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PushError>;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("config error: could not load config file '{path}' - {source}")]
    Config { path: String, source: std::io::Error },
    #[error("config error: malformed config file '{path}' - {source}")]
    ConfigFormat {
        path: String,
        source: serde_json::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} is not a git repository", path.display())]
    NotARepository { path: PathBuf },
    #[error("HEAD is detached in {}", path.display())]
    DetachedHead { path: PathBuf },
    #[error("remote 'origin' is not configured")]
    MissingRemote,
    #[error("authentication failed for '{url}': {message}")]
    Authentication { url: String, message: String },
    #[error("push of '{reference}' was rejected: {reason}")]
    PushRejected { reference: String, reason: String },
    #[error("could not determine the home directory")]
    NoHomeDir,
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("username and token must both be non-empty")]
    InvalidCredentials,
    #[error("prompt failed: {0}")]
    Prompt(String),
}

/// Failures of the OS secret store. "Not configured" is not an error; it is
/// reported as `Ok(None)` by lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    #[error("secret store returned a different value than was written")]
    Mismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("native notification failed ({native}); fallback failed ({fallback})")]
    Undelivered { native: String, fallback: String },
}
