use crate::config::{SearchConfig, StorageConfig};
use crate::http::ensure_success;
use crate::paths::PrefixRange;
use crate::traits::DocumentSearch;
use crate::{ContextDocument, RagError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

pub const SEARCH_API_VERSION: &str = "2023-11-01";
pub const CONTENT_FIELD: &str = "content";
pub const STORAGE_PATH_FIELD: &str = "metadata_storage_path";

pub struct AzureSearchStore {
    client: Client,
    search: SearchConfig,
    storage: StorageConfig,
}

impl AzureSearchStore {
    pub fn new(search: SearchConfig, storage: StorageConfig) -> Self {
        Self {
            client: Client::new(),
            search,
            storage,
        }
    }

    fn endpoint(&self) -> &str {
        self.search.endpoint.trim_end_matches('/')
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint(),
            self.search.index_name,
            SEARCH_API_VERSION
        )
    }

    fn indexer_run_url(&self, indexer: &str) -> String {
        format!(
            "{}/indexers/{}/run?api-version={}",
            self.endpoint(),
            indexer,
            SEARCH_API_VERSION
        )
    }
}

pub fn build_search_body(query: &str, range: &PrefixRange, top_k: usize) -> Value {
    json!({
        "search": query,
        "filter": range.odata_filter(STORAGE_PATH_FIELD),
        "select": format!("{CONTENT_FIELD},{STORAGE_PATH_FIELD}"),
        "top": top_k,
    })
}

/// Reads `value[]` from a search response, keeping only hits inside `range`.
pub fn parse_search_response(body: &Value, range: &PrefixRange) -> Vec<ContextDocument> {
    let hits = body
        .pointer("/value")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut documents = Vec::new();
    for hit in hits {
        let source = hit
            .get(STORAGE_PATH_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !range.contains(&source) {
            warn!(path = %source, "dropping search hit outside the user folder");
            continue;
        }

        let content = hit
            .get(CONTENT_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        documents.push(ContextDocument { content, source });
    }

    documents
}

#[async_trait]
impl DocumentSearch for AzureSearchStore {
    async fn search_user_documents(
        &self,
        username: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextDocument>, RagError> {
        let range = PrefixRange::for_user(&self.storage, username);
        let body = build_search_body(query, &range, top_k);

        info!(index = %self.search.index_name, query, top_k, "searching index");

        let response = self
            .client
            .post(self.search_url())
            .header("api-key", &self.search.api_key)
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response, "ai-search").await?;
        let parsed: Value = response.json().await?;

        let mut documents = parse_search_response(&parsed, &range);
        documents.truncate(top_k);
        Ok(documents)
    }

    async fn run_indexer(&self) -> Result<Option<String>, RagError> {
        let Some(indexer) = self.search.indexer_name.as_deref() else {
            return Ok(None);
        };

        info!(indexer, "starting indexer run");

        let response = self
            .client
            .post(self.indexer_run_url(indexer))
            .header("api-key", &self.search.api_key)
            .body(Vec::new())
            .send()
            .await?;

        ensure_success(response, "ai-search").await?;
        Ok(Some(indexer.to_string()))
    }
}
