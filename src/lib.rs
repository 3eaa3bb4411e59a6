//! drive_api - Folder-aware helpers over the Google Drive API.
//!
//! Drive stores files as a flat collection whose objects point at their
//! parent folders. This library reconstructs folder membership from one
//! listing per call and builds on it to:
//! - List the files inside a folder given its name
//! - Upload files to the drive root or to a named folder
//! - Download files by name or id
//! - Place a file from one folder into another
//! - Describe a file with its parent folder names resolved
//! - Search files by name, id, MIME type, extension or creation time
//!
//! # Example
//!
//! ```no_run
//! use drive_api::{Authenticator, DriveClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("credentials.json")?;
//!     let client = DriveClient::new(auth);
//!
//!     for file in client.list_folder("Documents").await? {
//!         println!("{}", file);
//!     }
//!
//!     let moved = client.move_file("Documents", "Archive", "report.docx").await?;
//!     println!("{} now has {} parents", moved.name, moved.parents.len());
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod metadata;
pub mod models;
pub mod search;
pub mod snapshot;
pub mod transfer;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::{DriveClient, MoveMode};
pub use error::{DriveError, Result};
pub use metadata::FileMetadata;
pub use models::{CreatedFile, FileUpdate, RemoteObject};
pub use snapshot::{FolderHandle, Snapshot};
pub use transfer::{TransferHandle, TransferProgress, TransferStatus};
