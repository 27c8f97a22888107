//! Google Drive v3 REST client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::config::DriveConfig;
use crate::store::{LocalImage, RemoteEntry, RemoteStore, StoreError};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

/// Drive client over the v3 REST API.
///
/// Requires a read-scoped OAuth access token in its [`DriveConfig`];
/// authentication itself happens outside this crate.
pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileMeta>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct FileMeta {
    id: String,
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        // Drive wraps failures as {"error": {"message": ...}}.
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(StoreError::Api { status: status.as_u16(), message })
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_children(&self, container_id: &str) -> Result<Vec<RemoteEntry>, StoreError> {
        let query = format!("'{container_id}' in parents and trashed=false");
        let url = format!("{}/files", self.config.api_base);

        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&self.config.access_token)
                .query(&[("q", query.as_str()), ("fields", LIST_FIELDS)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = Self::check_status(request.send().await?).await?;
            let page: FileList = response.json().await?;

            entries.extend(page.files.into_iter().map(|file| RemoteEntry {
                is_container: file.mime_type == FOLDER_MIME_TYPE,
                id: file.id,
                name: file.name,
                parent_id: Some(container_id.to_string()),
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(entries)
    }

    async fn download(
        &self,
        entry: &RemoteEntry,
        dest_dir: &Path,
    ) -> Result<LocalImage, StoreError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| StoreError::Io { path: dest_dir.to_path_buf(), source })?;

        let url = format!("{}/files/{}", self.config.api_base, entry.id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let mut response = Self::check_status(response).await?;

        // Remote names are user-controlled; keep only the final component.
        let file_name = Path::new(&entry.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.id.clone());
        let path = dest_dir.join(file_name);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|source| StoreError::Io { path: path.clone(), source })?;
        }
        file.flush()
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;

        tracing::debug!(id = %entry.id, path = %path.display(), "download complete");

        Ok(LocalImage {
            path,
            source_format: crate::store::name_extension(&entry.name),
        })
    }
}
