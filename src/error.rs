//! Error types for the drive_api crate.

use thiserror::Error;

/// Errors that can occur when working with Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    /// A folder or file name/id has no match in the current snapshot.
    #[error("{0}")]
    NotFound(String),

    /// The folder was resolved but holds no children.
    #[error("{0}")]
    FolderEmpty(String),

    /// The search ran but matched nothing.
    #[error("{0}")]
    SearchEmpty(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to read credentials file: {0}")]
    CredentialsFileError(#[source] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Transfer task aborted: {0}")]
    TransferAborted(String),

    /// A remote name that cannot be used as a single local file name.
    #[error("Invalid local file name: {0:?}")]
    InvalidFileName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

impl DriveError {
    /// Whether the backend rejected or failed a request, as opposed to a
    /// resolution failure against the snapshot.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DriveError::HttpError(_)
                | DriveError::ApiError { .. }
                | DriveError::TransferFailed(_)
                | DriveError::TransferAborted(_)
                | DriveError::Io(_)
        )
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
