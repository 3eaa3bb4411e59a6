//! Substring search over a snapshot.
//!
//! The query is the haystack: an object matches when one of its fields occurs
//! inside the query, not the other way around. A query like `"pdfcssaspx"`
//! therefore matches objects named `pdf`, `css` or `aspx`, and any object
//! whose extension is one of those.

use tracing::debug;

use crate::error::{DriveError, Result};
use crate::models::RemoteObject;
use crate::snapshot::Snapshot;

/// Token used in place of a missing file extension.
const MISSING_EXTENSION: &str = "null";

/// Whether any searchable field of `object` is contained in `query`.
///
/// `query` must already be lower-cased.
fn matches(query: &str, object: &RemoteObject) -> bool {
    let contains = |field: &str| query.contains(&field.to_lowercase());

    contains(&object.name)
        || contains(&object.id)
        || object.created_time.as_deref().is_some_and(contains)
        || object.mime_type.as_deref().is_some_and(contains)
        || contains(object.file_extension.as_deref().unwrap_or(MISSING_EXTENSION))
}

/// Objects of `snapshot` matched by `query`, in listing order.
///
/// Never returns an empty list; no match is [`DriveError::SearchEmpty`].
pub fn search<'a>(snapshot: &'a Snapshot, query: &str) -> Result<Vec<&'a RemoteObject>> {
    let query = query.to_lowercase();

    let results: Vec<&RemoteObject> = snapshot
        .objects()
        .iter()
        .filter(|object| matches(&query, object))
        .collect();

    debug!(query = %query, matches = results.len(), "searched snapshot");

    if results.is_empty() {
        return Err(DriveError::SearchEmpty(
            "Search doesn't return any result.".to_string(),
        ));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::{file, folder};

    fn named(id: &str, name: &str, extension: Option<&str>) -> RemoteObject {
        RemoteObject {
            id: id.to_string(),
            name: name.to_string(),
            size: Some(10),
            mime_type: Some("application/octet-stream".to_string()),
            created_time: Some("2023-05-05T05:05:05.000Z".to_string()),
            modified_time: None,
            parents: vec![],
            file_extension: extension.map(str::to_string),
        }
    }

    fn ids<'a>(results: &[&'a RemoteObject]) -> Vec<&'a str> {
        results.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_query_is_the_haystack() {
        let snapshot = Snapshot::new(vec![
            named("id-aaaaaaaa", "pdf", Some("txt")),
            named("id-bbbbbbbb", "pdfx", Some("txt")),
            named("id-cccccccc", "notes", Some("css")),
        ]);

        let results = search(&snapshot, "pdfcssaspx").unwrap();
        assert_eq!(ids(&results), vec!["id-aaaaaaaa", "id-cccccccc"]);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let snapshot = Snapshot::new(vec![named("id-aaaaaaaa", "Report", Some("docx"))]);

        assert_eq!(search(&snapshot, "REPORT").unwrap().len(), 1);
    }

    #[test]
    fn test_id_prefix_does_not_match() {
        let snapshot = Snapshot::new(vec![named("1ICclh6t6wbCwnz9rNSndOHumM7uwVxhB", "a.bin", Some("bin"))]);

        assert!(search(&snapshot, "1ICclh6t6wbCwnz9rNSndOHumM7uwVxhB").is_ok());
        assert!(search(&snapshot, "1ICclh6t6wbCwn").is_err());
    }

    #[test]
    fn test_missing_extension_matches_null_token() {
        let snapshot = Snapshot::new(vec![
            folder("f1", "Documents", &[]),
            file("x1", "doc.pdf", &["f1"]),
        ]);

        let results = search(&snapshot, "null").unwrap();
        assert_eq!(ids(&results), vec!["f1"]);
    }

    #[test]
    fn test_matches_mime_type_and_created_time() {
        let snapshot = Snapshot::new(vec![named("id-aaaaaaaa", "zzzzzz", Some("qqq"))]);

        assert!(search(&snapshot, "type: application/octet-stream").is_ok());
        assert!(search(&snapshot, "2023-05-05t05:05:05.000z").is_ok());
    }

    #[test]
    fn test_no_match_is_an_error() {
        let snapshot = Snapshot::new(vec![named("id-aaaaaaaa", "report", Some("docx"))]);

        let err = search(&snapshot, "xyz").unwrap_err();
        assert!(matches!(err, DriveError::SearchEmpty(_)));
    }

    #[test]
    fn test_empty_snapshot_is_an_error() {
        assert!(matches!(
            search(&Snapshot::default(), "anything"),
            Err(DriveError::SearchEmpty(_))
        ));
    }
}
