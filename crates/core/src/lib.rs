pub mod config;
pub mod credential;
pub mod error;
mod http;
pub mod models;
pub mod paths;
pub mod prompt;
pub mod session;
pub mod stores;
pub mod traits;

pub use config::{OpenAiConfig, RagConfig, SearchConfig, StorageConfig};
pub use credential::{
    AccessToken, AzureCliCredential, ClientSecretCredential, DefaultAzureCredential,
    ManagedIdentityCredential, TokenCredential, STORAGE_SCOPE,
};
pub use error::{RagError, Result};
pub use models::{ChatMessage, ChatRole, ContextDocument, UploadReceipt};
pub use paths::{blob_name, user_folder_prefix, PrefixRange};
pub use prompt::{build_context, build_messages, GENERATION_ERROR_ANSWER, NO_DOCUMENTS_ANSWER};
pub use session::{Session, DEFAULT_TOP_K};
pub use stores::{AzureOpenAiClient, AzureSearchStore, BlobStorageClient};
pub use traits::{AnswerGenerator, BlobStore, DocumentSearch};
