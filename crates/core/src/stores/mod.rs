pub mod ai_search;
pub mod blob_storage;
pub mod openai;

pub use ai_search::AzureSearchStore;
pub use blob_storage::BlobStorageClient;
pub use openai::AzureOpenAiClient;
