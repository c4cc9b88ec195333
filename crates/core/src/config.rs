//! Process-lifetime settings for the three Azure services.
//!
//! Values are read once at startup and passed by reference. Nothing here has a
//! default: an unset value stays empty and shows up later as an
//! authentication or connection failure from the service that needed it.

pub const ENV_STORAGE_ACCOUNT_URL: &str = "AZURE_STORAGE_ACCOUNT_URL";
pub const ENV_BLOB_CONTAINER_NAME: &str = "BLOB_CONTAINER_NAME";
pub const ENV_SEARCH_ENDPOINT: &str = "AZURE_SEARCH_ENDPOINT";
pub const ENV_SEARCH_INDEX_NAME: &str = "AZURE_SEARCH_INDEX_NAME";
pub const ENV_SEARCH_API_KEY: &str = "AZURE_SEARCH_API_KEY";
pub const ENV_SEARCH_INDEXER_NAME: &str = "AZURE_SEARCH_INDEXER_NAME";
pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT_NAME";
pub const ENV_OPENAI_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// e.g. `https://<account>.blob.core.windows.net`
    pub account_url: String,
    pub container: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchConfig {
    pub endpoint: String,
    pub index_name: String,
    pub api_key: String,
    /// Indexer crawling the blob container. When unset, new uploads only become
    /// searchable after someone runs the indexer by hand.
    pub indexer_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RagConfig {
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub openai: OpenAiConfig,
}

impl RagConfig {
    /// Names of the required environment variables whose value is empty.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        [
            (ENV_STORAGE_ACCOUNT_URL, &self.storage.account_url),
            (ENV_BLOB_CONTAINER_NAME, &self.storage.container),
            (ENV_SEARCH_ENDPOINT, &self.search.endpoint),
            (ENV_SEARCH_INDEX_NAME, &self.search.index_name),
            (ENV_SEARCH_API_KEY, &self.search.api_key),
            (ENV_OPENAI_ENDPOINT, &self.openai.endpoint),
            (ENV_OPENAI_API_KEY, &self.openai.api_key),
            (ENV_OPENAI_DEPLOYMENT, &self.openai.deployment),
            (ENV_OPENAI_API_VERSION, &self.openai.api_version),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_lists_empty_values_only() {
        let config = RagConfig {
            storage: StorageConfig {
                account_url: "https://acct.blob.core.windows.net".to_string(),
                container: "docs".to_string(),
            },
            search: SearchConfig {
                endpoint: "https://search.example.net".to_string(),
                index_name: "pdf-index".to_string(),
                api_key: "  ".to_string(),
                indexer_name: None,
            },
            openai: OpenAiConfig::default(),
        };

        assert_eq!(
            config.missing_settings(),
            vec![
                ENV_SEARCH_API_KEY,
                ENV_OPENAI_ENDPOINT,
                ENV_OPENAI_API_KEY,
                ENV_OPENAI_DEPLOYMENT,
                ENV_OPENAI_API_VERSION,
            ]
        );
    }

    #[test]
    fn indexer_name_is_optional() {
        let mut config = RagConfig::default();
        config.storage.account_url = "a".to_string();
        config.storage.container = "b".to_string();
        config.search = SearchConfig {
            endpoint: "c".to_string(),
            index_name: "d".to_string(),
            api_key: "e".to_string(),
            indexer_name: None,
        };
        config.openai = OpenAiConfig {
            endpoint: "f".to_string(),
            api_key: "g".to_string(),
            deployment: "h".to_string(),
            api_version: "i".to_string(),
        };

        assert!(config.missing_settings().is_empty());
    }
}
