//! Data models for Google Drive API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MIME type Google Drive reserves for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder object as returned by the files.list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// RFC 3339 string exactly as the API sent it.
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub file_extension: Option<String>,
}

impl RemoteObject {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.created_time.as_deref())
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.modified_time.as_deref())
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl std::fmt::Display for RemoteObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let mime = self.mime_type.as_deref().unwrap_or("-");
        write!(f, "{}\t{}\t{}\t{}", self.id, size_str, mime, self.name)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<RemoteObject>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response from files.create when only the id is requested back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedFile {
    pub id: String,
}

/// A metadata-only change to an existing file.
///
/// Parent changes travel as query parameters, the rest as the JSON body.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip)]
    pub add_parent: Option<String>,
    #[serde(skip)]
    pub remove_parent: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Credentials loaded from a JSON file.
///
/// Accepts both the service account key format and the `authorized_user`
/// format written by `gcloud auth application-default login`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    ServiceAccount(ServiceAccountCredentials),
    AuthorizedUser(AuthorizedUserCredentials),
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 user credentials holding a long-lived refresh token.
#[derive(Debug, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_remote_object_deserialize() {
        let json = r#"{
            "id": "x1",
            "name": "doc.pdf",
            "size": "2048",
            "mimeType": "application/pdf",
            "createdTime": "2023-03-01T10:15:30.000Z",
            "modifiedTime": "2023-03-02T08:00:00.000Z",
            "parents": ["f1"],
            "fileExtension": "pdf"
        }"#;

        let object: RemoteObject = serde_json::from_str(json).unwrap();
        assert_eq!(object.id, "x1");
        assert_eq!(object.size, Some(2048));
        assert_eq!(object.parents, vec!["f1".to_string()]);
        assert_eq!(object.file_extension.as_deref(), Some("pdf"));
        assert_eq!(
            object.created_time.as_deref(),
            Some("2023-03-01T10:15:30.000Z")
        );
        assert_eq!(
            object.created_at().unwrap().to_rfc3339(),
            "2023-03-01T10:15:30+00:00"
        );
        assert!(!object.is_folder());
    }

    #[test]
    fn test_folder_without_size_or_parents() {
        let json = r#"{
            "id": "f1",
            "name": "Documents",
            "mimeType": "application/vnd.google-apps.folder"
        }"#;

        let object: RemoteObject = serde_json::from_str(json).unwrap();
        assert!(object.is_folder());
        assert_eq!(object.size, None);
        assert!(object.parents.is_empty());
        assert_eq!(object.created_at(), None);
    }

    #[test]
    fn test_unparseable_timestamp_is_none() {
        let object = RemoteObject {
            id: "x".to_string(),
            name: "x".to_string(),
            size: None,
            mime_type: None,
            created_time: Some("yesterday".to_string()),
            modified_time: None,
            parents: vec![],
            file_extension: None,
        };
        assert_eq!(object.created_at(), None);
    }

    #[test]
    fn test_file_update_body_skips_parents() {
        let update = FileUpdate {
            name: Some("renamed.txt".to_string()),
            add_parent: Some("f2".to_string()),
            ..Default::default()
        };

        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({ "name": "renamed.txt" }));
    }

    #[test]
    fn test_credentials_variants() {
        let service: Credentials = serde_json::from_str(
            r#"{"client_email": "svc@p.iam.gserviceaccount.com", "private_key": "key"}"#,
        )
        .unwrap();
        assert!(matches!(service, Credentials::ServiceAccount(_)));

        let user: Credentials = serde_json::from_str(
            r#"{"client_id": "id", "client_secret": "secret", "refresh_token": "rt", "type": "authorized_user"}"#,
        )
        .unwrap();
        assert!(matches!(user, Credentials::AuthorizedUser(_)));
    }

    #[test]
    fn test_display_folder_no_size() {
        let object = RemoteObject {
            id: "f1".to_string(),
            name: "Documents".to_string(),
            size: None,
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            created_time: None,
            modified_time: None,
            parents: vec![],
            file_extension: None,
        };

        let display = object.to_string();
        assert_eq!(display, format!("f1\t-\t{}\tDocuments", FOLDER_MIME_TYPE));
    }
}
