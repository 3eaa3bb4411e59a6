//! Point-in-time view of every object visible to the authenticated identity.
//!
//! Drive has no native directory tree: each object only carries the ids of
//! its parents. A [`Snapshot`] indexes one listing by id and by lower-cased
//! name so that folder membership and name lookups are map lookups instead of
//! repeated scans. Duplicate names are not an error; every lookup returns the
//! first object in listing order.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{DriveError, Result};
use crate::models::RemoteObject;

/// A folder name resolved to its id, valid only for the snapshot it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderHandle<'a> {
    pub name: &'a str,
    pub id: &'a str,
}

/// One listing of remote objects plus the indexes built over it.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    objects: Vec<RemoteObject>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
    by_parent: HashMap<String, Vec<usize>>,
}

impl Snapshot {
    pub fn new(objects: Vec<RemoteObject>) -> Self {
        let mut by_id = HashMap::with_capacity(objects.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_parent: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, object) in objects.iter().enumerate() {
            by_id.entry(object.id.clone()).or_insert(idx);
            by_name
                .entry(object.name.to_lowercase())
                .or_default()
                .push(idx);

            for parent in &object.parents {
                let children = by_parent.entry(parent.clone()).or_default();
                // An object listing the same parent twice is still one child.
                if children.last() != Some(&idx) {
                    children.push(idx);
                }
            }
        }

        debug!(objects = objects.len(), "indexed snapshot");

        Self {
            objects,
            by_id,
            by_name,
            by_parent,
        }
    }

    /// All objects in listing order.
    pub fn objects(&self) -> &[RemoteObject] {
        &self.objects
    }

    pub fn into_objects(self) -> Vec<RemoteObject> {
        self.objects
    }

    /// Object with the given id, if present.
    pub fn get(&self, id: &str) -> Option<&RemoteObject> {
        self.by_id.get(id).map(|&idx| &self.objects[idx])
    }

    /// First object whose name equals `name`, ignoring case.
    fn first_named(&self, name: &str) -> Option<&RemoteObject> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|positions| positions.first())
            .map(|&idx| &self.objects[idx])
    }

    /// Resolve a folder name to its id.
    ///
    /// Any object kind may match, not just folder-typed ones.
    pub fn resolve_folder_id(&self, folder_name: &str) -> Result<FolderHandle<'_>> {
        let folder = self
            .first_named(folder_name)
            .ok_or_else(|| DriveError::NotFound("Folder does not exist".to_string()))?;

        debug!(folder = folder_name, id = %folder.id, "resolved folder");

        Ok(FolderHandle {
            name: &folder.name,
            id: &folder.id,
        })
    }

    /// Objects whose parents include `folder_id`, in listing order.
    ///
    /// An empty result is not an error here.
    pub fn list_children(&self, folder_id: &str) -> Vec<&RemoteObject> {
        self.by_parent
            .get(folder_id)
            .map(|positions| positions.iter().map(|&idx| &self.objects[idx]).collect())
            .unwrap_or_default()
    }

    /// First object whose name equals `name`, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Result<&RemoteObject> {
        self.first_named(name).ok_or_else(file_not_found)
    }

    /// Object whose id equals `id` exactly.
    pub fn find_by_id(&self, id: &str) -> Result<&RemoteObject> {
        self.get(id).ok_or_else(file_not_found)
    }

    /// First child of `folder_id` whose name equals `file_name` exactly.
    pub fn find_by_name_in_folder(&self, folder_id: &str, file_name: &str) -> Result<&RemoteObject> {
        self.by_parent
            .get(folder_id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.objects[idx])
            .find(|object| object.name == file_name)
            .ok_or_else(|| DriveError::NotFound("File does not exist in the folder".to_string()))
    }

    /// Names of the parents of `object` that are present in this snapshot.
    ///
    /// Parent ids with no matching object are dropped.
    pub fn parent_names(&self, object: &RemoteObject) -> Vec<String> {
        object
            .parents
            .iter()
            .filter_map(|parent| self.get(parent))
            .map(|parent| parent.name.clone())
            .collect()
    }
}

impl From<Vec<RemoteObject>> for Snapshot {
    fn from(objects: Vec<RemoteObject>) -> Self {
        Self::new(objects)
    }
}

fn file_not_found() -> DriveError {
    DriveError::NotFound("File doesn't exist".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::FOLDER_MIME_TYPE;

    pub(crate) fn folder(id: &str, name: &str, parents: &[&str]) -> RemoteObject {
        RemoteObject {
            id: id.to_string(),
            name: name.to_string(),
            size: None,
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            created_time: Some("2023-01-01T00:00:00.000Z".to_string()),
            modified_time: Some("2023-01-01T00:00:00.000Z".to_string()),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            file_extension: None,
        }
    }

    pub(crate) fn file(id: &str, name: &str, parents: &[&str]) -> RemoteObject {
        RemoteObject {
            id: id.to_string(),
            name: name.to_string(),
            size: Some(1024),
            mime_type: Some("application/octet-stream".to_string()),
            created_time: Some("2023-02-01T12:00:00.000Z".to_string()),
            modified_time: Some("2023-02-02T12:00:00.000Z".to_string()),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            file_extension: name.rsplit_once('.').map(|(_, ext)| ext.to_string()),
        }
    }

    fn documents_snapshot() -> Snapshot {
        Snapshot::new(vec![
            folder("root", "My Drive", &[]),
            folder("f1", "Documents", &["root"]),
            file("x1", "doc.pdf", &["f1"]),
            file("x2", "notes.txt", &["f1"]),
            file("x3", "photo.jpg", &["root"]),
        ])
    }

    #[test]
    fn test_resolve_folder_is_case_insensitive() {
        let snapshot = documents_snapshot();

        let handle = snapshot.resolve_folder_id("dOcUmEnTs").unwrap();
        assert_eq!(handle.id, "f1");
        assert_eq!(handle.name, "Documents");
    }

    #[test]
    fn test_resolve_missing_folder() {
        let snapshot = documents_snapshot();

        let err = snapshot.resolve_folder_id("Ghost").unwrap_err();
        assert!(matches!(err, DriveError::NotFound(ref msg) if msg == "Folder does not exist"));
    }

    #[test]
    fn test_resolve_first_match_wins_on_duplicate_names() {
        let snapshot = Snapshot::new(vec![
            folder("a1", "Reports", &[]),
            folder("a2", "reports", &[]),
        ]);

        assert_eq!(snapshot.resolve_folder_id("REPORTS").unwrap().id, "a1");
    }

    #[test]
    fn test_list_children() {
        let snapshot = documents_snapshot();

        let children = snapshot.list_children("f1");
        let ids: Vec<&str> = children.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["x1", "x2"]);
    }

    #[test]
    fn test_list_children_of_empty_folder_is_empty() {
        let mut objects = documents_snapshot().into_objects();
        objects.push(folder("f2", "Empty", &["root"]));
        let snapshot = Snapshot::new(objects);

        assert!(snapshot.list_children("f2").is_empty());
    }

    #[test]
    fn test_find_by_name_and_id() {
        let snapshot = documents_snapshot();

        assert_eq!(snapshot.find_by_name("DOC.PDF").unwrap().id, "x1");
        assert_eq!(snapshot.find_by_id("x2").unwrap().name, "notes.txt");
    }

    #[test]
    fn test_find_by_id_is_exact() {
        let snapshot = documents_snapshot();

        let err = snapshot.find_by_id("X1").unwrap_err();
        assert!(matches!(err, DriveError::NotFound(ref msg) if msg == "File doesn't exist"));
        assert!(snapshot.find_by_id("missing").is_err());
    }

    #[test]
    fn test_find_by_name_in_folder_is_scoped() {
        let snapshot = documents_snapshot();

        assert_eq!(snapshot.find_by_name_in_folder("f1", "doc.pdf").unwrap().id, "x1");

        let err = snapshot.find_by_name_in_folder("f1", "photo.jpg").unwrap_err();
        assert!(
            matches!(err, DriveError::NotFound(ref msg) if msg == "File does not exist in the folder")
        );
    }

    #[test]
    fn test_find_by_name_in_folder_is_case_sensitive() {
        let snapshot = documents_snapshot();

        assert!(snapshot.find_by_name_in_folder("f1", "DOC.pdf").is_err());
    }

    #[test]
    fn test_parent_names_drop_dangling_ids() {
        let snapshot = Snapshot::new(vec![
            folder("f1", "Documents", &[]),
            folder("f2", "Shared", &[]),
            file("x1", "doc.pdf", &["f1", "gone", "f2"]),
        ]);

        let object = snapshot.find_by_id("x1").unwrap();
        let names = snapshot.parent_names(object);
        assert_eq!(names, vec!["Documents".to_string(), "Shared".to_string()]);
        assert!(names.len() <= object.parents.len());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let snapshot = Snapshot::new(vec![file("x1", "first.txt", &[]), file("x1", "second.txt", &[])]);

        assert_eq!(snapshot.find_by_id("x1").unwrap().name, "first.txt");
        assert_eq!(snapshot.objects().len(), 2);
    }

    #[test]
    fn test_list_children_keeps_listing_order_across_parents() {
        let snapshot = Snapshot::new(vec![
            folder("f1", "Documents", &[]),
            file("x1", "a.txt", &["f1"]),
            file("x2", "b.txt", &["f2", "f1"]),
            folder("f2", "Shared", &[]),
            file("x3", "c.txt", &["f1", "f1"]),
        ]);

        let ids: Vec<&str> = snapshot.list_children("f1").iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["x1", "x2", "x3"]);
        assert_eq!(snapshot.list_children("f2")[0].id, "x2");
        assert!(snapshot.list_children("x1").is_empty());
        assert_eq!(snapshot.find_by_name_in_folder("f2", "b.txt").unwrap().id, "x2");
    }
}
