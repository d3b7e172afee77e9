use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::media::UploadErrorBody;
use crate::models::{UploadResult, UploadSignature};

/// Base URL of the media host's upload API
pub const DEFAULT_MEDIA_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Clone)]
pub struct MediaUploader {
    client: Client,
    base_url: String,
    folder: Option<String>,
}

impl MediaUploader {
    pub fn new(client: Client, base_url: impl Into<String>, folder: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            folder,
        }
    }

    pub fn upload_url(&self, signature: &UploadSignature) -> String {
        format!("{}/{}/image/upload", self.base_url, signature.cloud_name)
    }

    /// Upload one file under `signature`, returning its public URL.
    pub async fn upload(&self, signature: &UploadSignature, file: &Path) -> Result<String, ApiError> {
        let file_label = file.display().to_string();
        let bytes = tokio::fs::read(file).await.map_err(|e| ApiError::Upload {
            file: file_label.clone(),
            message: e.to_string(),
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", signature.api_key.clone())
            .text("timestamp", signature.timestamp.to_string())
            .text("signature", signature.signature.clone());
        if let Some(ref folder) = signature.folder {
            form = form.text("folder", folder.clone());
        }

        let url = self.upload_url(signature);
        debug!(file = %file_label, url = %url, "Uploading image");
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Self::parse_upload_response(&file_label, status, &body)
    }

    /// Upload every file, each under its own fresh signature, concurrently.
    /// The first failure fails the batch.
    pub async fn upload_all(
        &self,
        api: &ApiClient,
        files: &[PathBuf],
    ) -> Result<Vec<String>, ApiError> {
        let uploads = files.iter().map(|file| async move {
            let signature = api.upload_signature(self.folder.as_deref()).await?;
            self.upload(&signature, file).await
        });
        try_join_all(uploads).await
    }

    fn parse_upload_response(file: &str, status: StatusCode, body: &str) -> Result<String, ApiError> {
        if status.is_success() {
            let result: UploadResult = serde_json::from_str(body).map_err(|e| ApiError::Upload {
                file: file.to_string(),
                message: format!("unexpected response: {}", e),
            })?;
            return Ok(result.secure_url);
        }

        let message = serde_json::from_str::<UploadErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("upload rejected").to_string());
        warn!(file, status = status.as_u16(), message = %message, "Media host rejected upload");
        Err(ApiError::Upload {
            file: file.to_string(),
            message,
        })
    }
}
