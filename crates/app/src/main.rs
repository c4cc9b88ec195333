use chrono::Utc;
use clap::{Args, Parser};
use scoped_rag_core::config::{
    ENV_BLOB_CONTAINER_NAME, ENV_OPENAI_API_KEY, ENV_OPENAI_API_VERSION, ENV_OPENAI_DEPLOYMENT,
    ENV_OPENAI_ENDPOINT, ENV_SEARCH_API_KEY, ENV_SEARCH_ENDPOINT, ENV_SEARCH_INDEXER_NAME,
    ENV_SEARCH_INDEX_NAME, ENV_STORAGE_ACCOUNT_URL,
};
use scoped_rag_core::{
    AzureOpenAiClient, AzureSearchStore, BlobStorageClient, DefaultAzureCredential, OpenAiConfig,
    RagConfig, SearchConfig, Session, StorageConfig, TokenCredential, DEFAULT_TOP_K,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Upload PDFs to your storage folder and ask questions answered from them.
#[derive(Parser)]
#[command(name = "scoped-rag", version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Number of search results passed to the model as context.
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
}

#[derive(Args)]
struct Settings {
    /// Blob storage account URL, e.g. https://<account>.blob.core.windows.net
    #[arg(long, env = ENV_STORAGE_ACCOUNT_URL, default_value = "")]
    storage_account_url: String,

    /// Blob container holding one folder per user
    #[arg(long, env = ENV_BLOB_CONTAINER_NAME, default_value = "")]
    container: String,

    /// Azure AI Search endpoint
    #[arg(long, env = ENV_SEARCH_ENDPOINT, default_value = "")]
    search_endpoint: String,

    /// Azure AI Search index name
    #[arg(long, env = ENV_SEARCH_INDEX_NAME, default_value = "")]
    search_index: String,

    /// Azure AI Search query key
    #[arg(long, env = ENV_SEARCH_API_KEY, default_value = "", hide_env_values = true)]
    search_api_key: String,

    /// Indexer to run after an upload
    #[arg(long, env = ENV_SEARCH_INDEXER_NAME)]
    search_indexer: Option<String>,

    /// Azure OpenAI endpoint
    #[arg(long, env = ENV_OPENAI_ENDPOINT, default_value = "")]
    openai_endpoint: String,

    /// Azure OpenAI key
    #[arg(long, env = ENV_OPENAI_API_KEY, default_value = "", hide_env_values = true)]
    openai_api_key: String,

    /// Chat model deployment name
    #[arg(long, env = ENV_OPENAI_DEPLOYMENT, default_value = "")]
    openai_deployment: String,

    /// Azure OpenAI REST api-version
    #[arg(long, env = ENV_OPENAI_API_VERSION, default_value = "")]
    openai_api_version: String,
}

impl From<Settings> for RagConfig {
    fn from(settings: Settings) -> Self {
        RagConfig {
            storage: StorageConfig {
                account_url: settings.storage_account_url,
                container: settings.container,
            },
            search: SearchConfig {
                endpoint: settings.search_endpoint,
                index_name: settings.search_index,
                api_key: settings.search_api_key,
                indexer_name: settings
                    .search_indexer
                    .filter(|name| !name.trim().is_empty()),
            },
            openai: OpenAiConfig {
                endpoint: settings.openai_endpoint,
                api_key: settings.openai_api_key,
                deployment: settings.openai_deployment,
                api_version: settings.openai_api_version,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let top_k = cli.top_k;
    let config = RagConfig::from(cli.settings);

    for setting in config.missing_settings() {
        warn!(setting, "configuration value is not set");
    }

    let credential = DefaultAzureCredential::from_env();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        credential_sources = ?credential.source_names(),
        top_k,
        "scoped-rag boot"
    );
    let credential: Arc<dyn TokenCredential> = Arc::new(credential);

    let store = BlobStorageClient::new(config.storage.clone(), credential);
    let search = AzureSearchStore::new(config.search.clone(), config.storage.clone());
    let generator = AzureOpenAiClient::new(config.openai.clone());
    let session = Session::new(store, search, generator).with_top_k(top_k);

    let stdin = std::io::stdin();
    session.run(stdin.lock(), std::io::stdout()).await?;

    Ok(())
}
