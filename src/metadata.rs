//! Denormalized file metadata with parent folder names resolved.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::RemoteObject;
use crate::snapshot::Snapshot;

/// Rendering used when a file has no resolvable parent.
pub const ROOT_FOLDER_LABEL: &str = "My root folder";

/// Metadata view of a single file, built fresh for each query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_size: Option<u64>,
    pub created_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
    /// One name per resolvable parent id, in `parents` order.
    pub parent_folder_names: Vec<String>,
}

impl FileMetadata {
    /// Build the record for `object`, resolving its parents against `snapshot`.
    pub fn from_object(snapshot: &Snapshot, object: &RemoteObject) -> Self {
        Self {
            file_name: object.name.clone(),
            file_size: object.size,
            created_date: object.created_at(),
            last_modified_date: object.modified_at(),
            parent_folder_names: snapshot.parent_names(object),
        }
    }

    pub fn is_in_root(&self) -> bool {
        self.parent_folder_names.is_empty()
    }

    /// Parent folder names, or the root label when there are none.
    ///
    /// Every name is followed by `",\n"`, including the last one.
    pub fn parent_folders_display(&self) -> String {
        if self.parent_folder_names.is_empty() {
            return ROOT_FOLDER_LABEL.to_string();
        }

        self.parent_folder_names
            .iter()
            .map(|name| format!("{},\n", name))
            .collect()
    }
}

impl fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.file_size.map(|s| s.to_string()).unwrap_or_default();
        let created = self.created_date.map(|d| d.to_rfc3339()).unwrap_or_default();
        let modified = self
            .last_modified_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();

        write!(
            f,
            "File Name = {}, \n File Size in bytes = {},\n, Created Date = {},\nLast Modified Date = {}\n, Parent Folder Name(s) = {}",
            self.file_name,
            size,
            created,
            modified,
            self.parent_folders_display()
        )
    }
}

/// Metadata for the first object named `name`, ignoring case.
pub fn describe_by_name(snapshot: &Snapshot, name: &str) -> Result<FileMetadata> {
    let object = snapshot.find_by_name(name)?;
    Ok(FileMetadata::from_object(snapshot, object))
}

/// Metadata for the object with id `id`.
pub fn describe_by_id(snapshot: &Snapshot, id: &str) -> Result<FileMetadata> {
    let object = snapshot.find_by_id(id)?;
    Ok(FileMetadata::from_object(snapshot, object))
}
