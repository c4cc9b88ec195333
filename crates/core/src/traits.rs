use crate::{ChatMessage, ContextDocument, RagError, UploadReceipt};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait BlobStore {
    /// Writes the file to `{username}/{file name}`, replacing any existing blob.
    async fn upload_file(
        &self,
        username: &str,
        local_path: &Path,
    ) -> Result<UploadReceipt, RagError>;
}

#[async_trait]
pub trait DocumentSearch {
    /// Relevance-ordered hits restricted to the user's folder.
    async fn search_user_documents(
        &self,
        username: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextDocument>, RagError>;

    /// Starts an indexer run, returning its name, or `None` if no indexer is
    /// configured.
    async fn run_indexer(&self) -> Result<Option<String>, RagError>;
}

#[async_trait]
pub trait AnswerGenerator {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<String, RagError>;
}
