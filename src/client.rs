//! Google Drive API client with folder-aware operations.
//!
//! Every public operation fetches its own fresh [`Snapshot`] of the drive and
//! resolves names against it. Nothing is cached between calls, so two calls
//! may see different states of the drive.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, Response};
use serde::de::DeserializeOwned;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::error::{DriveError, Result};
use crate::metadata::{self, FileMetadata};
use crate::models::{ApiErrorResponse, CreatedFile, FileListResponse, FileUpdate, RemoteObject};
use crate::search;
use crate::snapshot::Snapshot;
use crate::transfer::{ProgressReporter, TransferHandle};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Uploads larger than this use the resumable protocol (5 MB).
const RESUMABLE_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Fields requested for every object in a listing.
const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, size, mimeType, createdTime, modifiedTime, parents, fileExtension)";

/// Creates only ask for the new object's id back.
const CREATE_FIELDS: &str = "id";

const ALL_FIELDS: &str = "*";

/// How [`DriveClient::move_file_with`] places the file in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveMode {
    /// Add the destination as an extra parent. The file stays in the source
    /// folder too.
    #[default]
    AddParent,
    /// Add the destination and remove the source folder from the parents.
    ReplaceParent,
    /// Create a copy of the file inside the destination.
    Duplicate,
}

/// Client for folder-aware operations on a Google Drive.
#[derive(Clone)]
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a new DriveClient against the public Google endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_base_urls(auth, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a client against other endpoints, e.g. a local mock server.
    pub fn with_base_urls(
        auth: Authenticator,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the objects visible to the authenticated identity.
    ///
    /// Only the first page of the listing is read.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("fields", LIST_FIELDS)])
            .send()
            .await?;

        let list_response: FileListResponse = ensure_success(response).await?.json().await?;

        if list_response.next_page_token.is_some() {
            warn!(
                fetched = list_response.files.len(),
                "listing has more pages; only the first page is used"
            );
        }

        debug!(objects = list_response.files.len(), "fetched listing");
        Ok(Snapshot::new(list_response.files))
    }

    /// Every object in a fresh listing.
    pub async fn list_files(&self) -> Result<Vec<RemoteObject>> {
        Ok(self.snapshot().await?.into_objects())
    }

    /// Objects directly inside the folder named `folder_name`.
    ///
    /// A folder with no children is reported as [`DriveError::FolderEmpty`].
    pub async fn list_folder(&self, folder_name: &str) -> Result<Vec<RemoteObject>> {
        let snapshot = self.snapshot().await?;
        let folder = snapshot.resolve_folder_id(folder_name)?;

        let children = snapshot.list_children(folder.id);
        if children.is_empty() {
            return Err(DriveError::FolderEmpty(
                "Folder doesn't contain any file.".to_string(),
            ));
        }

        Ok(children.into_iter().cloned().collect())
    }

    /// Metadata of the first file named `file_name`, ignoring case.
    pub async fn describe_by_name(&self, file_name: &str) -> Result<FileMetadata> {
        let snapshot = self.snapshot().await?;
        metadata::describe_by_name(&snapshot, file_name)
    }

    /// Metadata of the file with id `file_id`.
    pub async fn describe_by_id(&self, file_id: &str) -> Result<FileMetadata> {
        let snapshot = self.snapshot().await?;
        metadata::describe_by_id(&snapshot, file_id)
    }

    /// Objects with a name, id, created time, MIME type or extension
    /// contained in `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<RemoteObject>> {
        let snapshot = self.snapshot().await?;
        let results = search::search(&snapshot, query)?;
        Ok(results.into_iter().cloned().collect())
    }

    /// Add the folder `to` as a parent of `file_name` from folder `from`.
    ///
    /// The file keeps its old parent, so the result usually has two.
    pub async fn move_file(&self, from: &str, to: &str, file_name: &str) -> Result<RemoteObject> {
        self.move_file_with(from, to, file_name, MoveMode::AddParent)
            .await
    }

    pub async fn move_file_with(
        &self,
        from: &str,
        to: &str,
        file_name: &str,
        mode: MoveMode,
    ) -> Result<RemoteObject> {
        let snapshot = self.snapshot().await?;

        let from_id = snapshot
            .resolve_folder_id(from)
            .map_err(|_| DriveError::NotFound("Source folder doesn't exist".to_string()))?
            .id;
        let to_id = snapshot
            .resolve_folder_id(to)
            .map_err(|_| DriveError::NotFound("Destination folder doesn't exist".to_string()))?
            .id;
        let file_id = snapshot.find_by_name_in_folder(from_id, file_name)?.id.as_str();

        let result = match mode {
            MoveMode::AddParent => {
                let update = FileUpdate {
                    add_parent: Some(to_id.to_string()),
                    ..Default::default()
                };
                self.update_metadata(file_id, &update).await?
            }
            MoveMode::ReplaceParent => {
                let update = FileUpdate {
                    add_parent: Some(to_id.to_string()),
                    remove_parent: Some(from_id.to_string()),
                    ..Default::default()
                };
                self.update_metadata(file_id, &update).await?
            }
            MoveMode::Duplicate => self.copy_file(file_id, to_id).await?,
        };

        info!(file = file_name, from, to, ?mode, id = %result.id, "placed file in folder");
        Ok(result)
    }

    /// Fetch a single object by id, bypassing the listing.
    pub async fn get_file(&self, file_id: &str) -> Result<RemoteObject> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", ALL_FIELDS)])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DriveError::NotFound("File doesn't exist".to_string()));
        }

        Ok(ensure_success(response).await?.json().await?)
    }

    /// Apply a metadata-only change and return the updated object.
    pub async fn update_metadata(&self, file_id: &str, update: &FileUpdate) -> Result<RemoteObject> {
        let token = self.auth.get_access_token().await?;

        let mut request = self
            .http
            .patch(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", ALL_FIELDS)])
            .json(update);

        if let Some(parent) = &update.add_parent {
            request = request.query(&[("addParents", parent)]);
        }
        if let Some(parent) = &update.remove_parent {
            request = request.query(&[("removeParents", parent)]);
        }

        let response = request.send().await?;
        let updated: RemoteObject = ensure_success(response).await?.json().await?;

        info!(id = %updated.id, parents = ?updated.parents, "updated file metadata");
        Ok(updated)
    }

    async fn copy_file(&self, file_id: &str, parent_id: &str) -> Result<RemoteObject> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .post(format!("{}/files/{}/copy", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", ALL_FIELDS)])
            .json(&serde_json::json!({ "parents": [parent_id] }))
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    /// Upload a local file to the root of the drive.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
    ) -> Result<TransferHandle<CreatedFile>> {
        self.start_upload(local_path.as_ref(), Vec::new()).await
    }

    /// Upload a local file into the folder named `folder_name`.
    ///
    /// The folder is resolved before any content is sent.
    pub async fn upload_file_to_folder<P: AsRef<Path>>(
        &self,
        folder_name: &str,
        local_path: P,
    ) -> Result<TransferHandle<CreatedFile>> {
        let snapshot = self.snapshot().await?;
        let folder_id = snapshot.resolve_folder_id(folder_name)?.id.to_string();

        self.start_upload(local_path.as_ref(), vec![folder_id]).await
    }

    async fn start_upload(
        &self,
        local_path: &Path,
        parents: Vec<String>,
    ) -> Result<TransferHandle<CreatedFile>> {
        let content = LocalContent::inspect(local_path).await?;
        let mut metadata = serde_json::json!({
            "name": content.name,
            "mimeType": content.mime_type,
        });
        if !parents.is_empty() {
            metadata["parents"] = serde_json::json!(parents);
        }

        let client = self.clone();
        Ok(TransferHandle::spawn(Some(content.size), move |reporter| async move {
            let created: CreatedFile = client
                .send_content(Method::POST, "/files", metadata, CREATE_FIELDS, &content, reporter)
                .await?;

            info!(file = %content.name, id = %created.id, "uploaded file");
            Ok::<_, DriveError>(created)
        }))
    }

    /// Replace the content of `file_id` with a local file.
    ///
    /// The remote name and MIME type are taken from the local file.
    pub async fn update_file<P: AsRef<Path>>(
        &self,
        file_id: &str,
        local_path: P,
    ) -> Result<TransferHandle<RemoteObject>> {
        let existing = self.get_file(file_id).await?;
        let content = LocalContent::inspect(local_path.as_ref()).await?;

        let metadata = serde_json::json!({
            "name": content.name,
            "mimeType": content.mime_type,
        });
        let endpoint = format!("/files/{}", existing.id);

        let client = self.clone();
        Ok(TransferHandle::spawn(Some(content.size), move |reporter| async move {
            let updated: RemoteObject = client
                .send_content(Method::PATCH, &endpoint, metadata, ALL_FIELDS, &content, reporter)
                .await?;

            info!(id = %updated.id, file = %content.name, "updated file content");
            Ok::<_, DriveError>(updated)
        }))
    }

    /// Send metadata plus file content, picking multipart or resumable by size.
    async fn send_content<R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        metadata: serde_json::Value,
        fields: &str,
        content: &LocalContent,
        reporter: ProgressReporter,
    ) -> Result<R> {
        if content.size > RESUMABLE_THRESHOLD {
            self.send_resumable(method, endpoint, metadata, fields, content, reporter)
                .await
        } else {
            self.send_multipart(method, endpoint, metadata, fields, content, reporter)
                .await
        }
    }

    async fn send_multipart<R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        metadata: serde_json::Value,
        fields: &str,
        content: &LocalContent,
        reporter: ProgressReporter,
    ) -> Result<R> {
        let token = self.auth.get_access_token().await?;

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let file_part = Part::stream_with_length(content.body(reporter).await?, content.size)
            .file_name(content.name.clone())
            .mime_str(&content.mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .request(method, format!("{}{}", self.upload_base, endpoint))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", fields),
            ])
            .multipart(form)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn send_resumable<R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        metadata: serde_json::Value,
        fields: &str,
        content: &LocalContent,
        reporter: ProgressReporter,
    ) -> Result<R> {
        let token = self.auth.get_access_token().await?;

        // Step 1: Open the upload session
        let init_response = self
            .http
            .request(method, format!("{}{}", self.upload_base, endpoint))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Type", content.mime_type.as_str())
            .header("X-Upload-Content-Length", content.size.to_string())
            .json(&metadata)
            .send()
            .await?;

        let init_response = ensure_success(init_response).await?;
        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                DriveError::TransferFailed("No upload URL in response".to_string())
            })?
            .to_string();

        debug!(file = %content.name, "opened resumable upload session");

        // Step 2: Stream the file content into the session
        let upload_response = self
            .http
            .put(&upload_url)
            .header("Content-Type", content.mime_type.as_str())
            .header("Content-Length", content.size.to_string())
            .query(&[("fields", fields)])
            .body(content.body(reporter).await?)
            .send()
            .await?;

        Ok(ensure_success(upload_response).await?.json().await?)
    }

    /// Download the first file named `file_name` into `directory`.
    ///
    /// The local file is named exactly as requested.
    pub async fn download_by_name<P: AsRef<Path>>(
        &self,
        file_name: &str,
        directory: P,
    ) -> Result<TransferHandle<PathBuf>> {
        let snapshot = self.snapshot().await?;
        let object = snapshot.find_by_name(file_name)?;

        let destination = directory.as_ref().join(local_file_name(file_name)?);
        Ok(self.start_download(object.id.clone(), destination, object.size))
    }

    /// Download the file with id `file_id` into `directory` under its remote name.
    pub async fn download_by_id<P: AsRef<Path>>(
        &self,
        file_id: &str,
        directory: P,
    ) -> Result<TransferHandle<PathBuf>> {
        let snapshot = self.snapshot().await?;
        let object = snapshot.find_by_id(file_id)?;

        let destination = directory.as_ref().join(local_file_name(&object.name)?);
        Ok(self.start_download(object.id.clone(), destination, object.size))
    }

    fn start_download(
        &self,
        file_id: String,
        destination: PathBuf,
        size: Option<u64>,
    ) -> TransferHandle<PathBuf> {
        let client = self.clone();
        TransferHandle::spawn(size, move |reporter| async move {
            client.download_to(&file_id, &destination, &reporter).await?;
            info!(id = %file_id, path = %destination.display(), "downloaded file");
            Ok::<_, DriveError>(destination)
        })
    }

    /// Stream content into `<destination>.part`, renamed once complete.
    async fn download_to(
        &self,
        file_id: &str,
        destination: &Path,
        reporter: &ProgressReporter,
    ) -> Result<()> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let response = ensure_success(response).await?;
        if let Some(length) = response.content_length() {
            reporter.set_total(Some(length));
        }

        let partial = partial_path(destination);
        let written = async {
            let mut file = File::create(&partial).await?;
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                reporter.advance(chunk.len() as u64);
            }

            file.flush().await?;
            Ok::<(), DriveError>(())
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        fs::rename(&partial, destination).await?;
        Ok(())
    }
}

/// Reduce a remote name to one path component.
///
/// Drive names may contain path separators; they become `_` so the result
/// always stays inside the target directory.
fn local_file_name(name: &str) -> Result<String> {
    let sanitized: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => Err(DriveError::InvalidFileName(name.to_string())),
        _ => Ok(sanitized),
    }
}

/// A local file about to be sent.
struct LocalContent {
    path: PathBuf,
    name: String,
    mime_type: String,
    size: u64,
}

impl LocalContent {
    async fn inspect(local_path: &Path) -> Result<Self> {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DriveError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", local_path.display()),
                ))
            })?
            .to_string();

        let size = fs::metadata(local_path).await?.len();
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        Ok(Self {
            path: local_path.to_path_buf(),
            name,
            mime_type,
            size,
        })
    }

    /// Streamed request body that reports every chunk read.
    async fn body(&self, reporter: ProgressReporter) -> Result<Body> {
        let file = File::open(&self.path).await?;
        let stream = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                reporter.advance(bytes.len() as u64);
            }
        });
        Ok(Body::wrap_stream(stream))
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Turn a non-2xx response into an [`DriveError::ApiError`].
///
/// Uses the Google error envelope when the body has one.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }

    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}
