//! Media host payloads.

use serde::{Deserialize, Serialize};

/// Signed, time-boxed permission to upload one file straight to the media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSignature {
    pub signature: String,
    pub timestamp: i64,
    pub api_key: String,
    pub cloud_name: String,
    #[serde(default)]
    pub folder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub secure_url: String,
    #[serde(default)]
    pub public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadErrorBody {
    pub error: UploadErrorMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadErrorMessage {
    pub message: String,
}
