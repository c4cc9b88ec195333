use crate::config::StorageConfig;
use crate::credential::{TokenCredential, STORAGE_SCOPE};
use crate::http::ensure_success;
use crate::paths::blob_name;
use crate::traits::BlobStore;
use crate::{RagError, UploadReceipt};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use url::Url;

pub const BLOB_API_VERSION: &str = "2023-11-03";

pub struct BlobStorageClient {
    client: Client,
    storage: StorageConfig,
    credential: Arc<dyn TokenCredential>,
}

impl BlobStorageClient {
    pub fn new(storage: StorageConfig, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            client: Client::new(),
            storage,
            credential,
        }
    }

    /// `{account_url}/{container}/{blob_name}` with each segment percent-encoded.
    pub fn blob_url(&self, blob_name: &str) -> Result<Url, RagError> {
        let mut url = Url::parse(self.storage.account_url.trim_end_matches('/'))?;
        url.path_segments_mut()
            .map_err(|_| {
                RagError::InvalidArgument(format!(
                    "storage account url cannot carry a path: {}",
                    self.storage.account_url
                ))
            })?
            .pop_if_empty()
            .push(&self.storage.container)
            .extend(blob_name.split('/'));
        Ok(url)
    }
}

pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

async fn read_local_file(path: &Path) -> Result<Vec<u8>, RagError> {
    tokio::fs::read(path).await.map_err(|error| match error.kind() {
        std::io::ErrorKind::NotFound => {
            RagError::NotFound(format!("local file {}", path.display()))
        }
        _ => RagError::Io(error),
    })
}

#[async_trait]
impl BlobStore for BlobStorageClient {
    async fn upload_file(
        &self,
        username: &str,
        local_path: &Path,
    ) -> Result<UploadReceipt, RagError> {
        let blob_name = blob_name(username, local_path)?;
        let url = self.blob_url(&blob_name)?;
        let bytes = read_local_file(local_path).await?;
        let size_bytes = bytes.len() as u64;
        let content_type = content_type_for(local_path);
        let sha256 = sha256_hex(&bytes);

        let token = self.credential.get_token(STORAGE_SCOPE).await?;

        info!(
            blob = %blob_name,
            container = %self.storage.container,
            size_bytes,
            "uploading blob"
        );

        let response = self
            .client
            .put(url.clone())
            .bearer_auth(&token.token)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", BLOB_API_VERSION)
            .header("x-ms-meta-sha256", &sha256)
            .header(CONTENT_TYPE, &content_type)
            .body(bytes)
            .send()
            .await?;

        ensure_success(response, "blob-storage").await?;

        Ok(UploadReceipt {
            blob_name,
            url: url.to_string(),
            size_bytes,
            content_type,
            sha256,
            uploaded_at: Utc::now(),
        })
    }
}
