//! Interactive question loop: pick a user, optionally upload one file, then
//! answer questions from that user's documents until told to stop.

use crate::prompt::{build_messages, GENERATION_ERROR_ANSWER, NO_DOCUMENTS_ANSWER, TEMPERATURE};
use crate::traits::{AnswerGenerator, BlobStore, DocumentSearch};
use crate::{ContextDocument, RagError};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_TOP_K: usize = 3;
pub const EXIT_KEYWORDS: [&str; 2] = ["exit", "quit"];

const RULE_WIDTH: usize = 60;

pub struct Session<B, S, G>
where
    B: BlobStore,
    S: DocumentSearch,
    G: AnswerGenerator,
{
    store: B,
    search: S,
    generator: G,
    top_k: usize,
}

impl<B, S, G> Session<B, S, G>
where
    B: BlobStore + Send + Sync,
    S: DocumentSearch + Send + Sync,
    G: AnswerGenerator + Send + Sync,
{
    pub fn new(store: B, search: S, generator: G) -> Self {
        Self {
            store,
            search,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn run<R, W>(&self, mut input: R, mut output: W) -> Result<(), RagError>
    where
        R: BufRead,
        W: Write,
    {
        writeln!(output, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(output, "      PDF QUESTION ANSWERING (per-user folders)      ")?;
        writeln!(output, "{}", "=".repeat(RULE_WIDTH))?;

        let Some(username) = prompt(&mut input, &mut output, "Enter your username (e.g., alice): ")?
        else {
            return Ok(());
        };
        let username = username.trim().to_string();
        if username.is_empty() {
            return Ok(());
        }
        info!(user = %username, "session started");

        writeln!(output, "{}", "-".repeat(RULE_WIDTH))?;
        let choice = prompt(
            &mut input,
            &mut output,
            "Do you want to upload a new PDF file? (yes/no): ",
        )?
        .unwrap_or_default();

        if matches!(choice.trim().to_lowercase().as_str(), "yes" | "y") {
            let raw_path = prompt(
                &mut input,
                &mut output,
                "Enter the full path to your PDF file: ",
            )?
            .unwrap_or_default();
            let file_path = clean_path_input(&raw_path);

            if Path::new(&file_path).exists() {
                self.upload_file(&mut output, &username, Path::new(&file_path))
                    .await?;
            } else {
                writeln!(output, "File not found.")?;
            }
        }

        loop {
            writeln!(output, "\n{}", "=".repeat(RULE_WIDTH))?;
            let Some(question) =
                prompt(&mut input, &mut output, "Ask a question (or type 'exit'): ")?
            else {
                break;
            };
            let question = question.trim();

            if is_exit_keyword(question) {
                break;
            }
            if question.is_empty() {
                continue;
            }

            let documents = self
                .search_documents(&mut output, &username, question)
                .await?;
            let answer = self
                .generate_rag_answer(&mut output, question, &documents)
                .await?;

            writeln!(output, "\n{}", "-".repeat(30))?;
            writeln!(output, "AI ANSWER:")?;
            writeln!(output, "{answer}")?;
            writeln!(output, "{}", "-".repeat(30))?;
        }

        info!(user = %username, "session finished");
        Ok(())
    }

    /// Uploads the file into the user's folder. Failures are described on
    /// `output` and reported as `false`.
    pub async fn upload_file<W: Write>(
        &self,
        output: &mut W,
        username: &str,
        local_path: &Path,
    ) -> io::Result<bool> {
        writeln!(output, "\n--- Uploading for user: {username} ---")?;

        match self.store.upload_file(username, local_path).await {
            Ok(receipt) => {
                info!(
                    blob = %receipt.blob_name,
                    size_bytes = receipt.size_bytes,
                    sha256 = %receipt.sha256,
                    "upload complete"
                );
                writeln!(output, "Uploaded to '{}'.", receipt.blob_name)?;
                self.refresh_index(output).await?;
                Ok(true)
            }
            Err(error) => {
                warn!(%error, path = %local_path.display(), "upload failed");
                writeln!(output, "Upload failed: {error}")?;
                write_upload_hints(output, &error)?;
                Ok(false)
            }
        }
    }

    async fn refresh_index<W: Write>(&self, output: &mut W) -> io::Result<()> {
        match self.search.run_indexer().await {
            Ok(Some(indexer)) => writeln!(
                output,
                "Started indexer '{indexer}'. The file becomes searchable once the run completes."
            ),
            Ok(None) => writeln!(
                output,
                "REMINDER: run the Azure AI Search indexer for this file to appear in search."
            ),
            Err(error) => {
                warn!(%error, "indexer run failed");
                writeln!(
                    output,
                    "Could not start the indexer ({error}). Run it manually for this file to appear in search."
                )
            }
        }
    }

    /// At most `top_k` documents from the user's folder; empty on any failure.
    pub async fn search_documents<W: Write>(
        &self,
        output: &mut W,
        username: &str,
        query: &str,
    ) -> io::Result<Vec<ContextDocument>> {
        writeln!(output, "--- Searching for: '{query}' ---")?;

        match self
            .search
            .search_user_documents(username, query, self.top_k)
            .await
        {
            Ok(documents) => {
                writeln!(
                    output,
                    "Found {} relevant documents for user '{username}'.",
                    documents.len()
                )?;
                Ok(documents)
            }
            Err(error) => {
                warn!(%error, user = %username, "search failed");
                writeln!(output, "ERROR: Search failed. Details: {error}")?;
                Ok(Vec::new())
            }
        }
    }

    /// Answers from `documents` only. Without documents no request is made.
    pub async fn generate_rag_answer<W: Write>(
        &self,
        output: &mut W,
        question: &str,
        documents: &[ContextDocument],
    ) -> io::Result<String> {
        writeln!(output, "--- Generating answer... ---")?;

        if documents.is_empty() {
            return Ok(NO_DOCUMENTS_ANSWER.to_string());
        }

        let messages = build_messages(question, documents);
        match self.generator.complete(&messages, TEMPERATURE).await {
            Ok(answer) => Ok(answer),
            Err(error) => {
                warn!(%error, "answer generation failed");
                writeln!(output, "ERROR: Answer generation failed. Details: {error}")?;
                Ok(GENERATION_ERROR_ANSWER.to_string())
            }
        }
    }
}

fn write_upload_hints<W: Write>(output: &mut W, error: &RagError) -> io::Result<()> {
    match error {
        RagError::Auth(_) => {
            writeln!(output, "\n[TROUBLESHOOTING]")?;
            writeln!(output, "1. Did you run 'az login' in your terminal?")?;
            writeln!(
                output,
                "2. Does your account have the 'Storage Blob Data Contributor' role on this storage account?"
            )
        }
        RagError::NotFound(_) => writeln!(
            output,
            "Check that the file exists and that the container name is correct."
        ),
        RagError::Network(_) => writeln!(
            output,
            "Check the storage account URL and your network connection."
        ),
        _ => Ok(()),
    }
}

/// Writes `text`, then reads one line. `None` once input is exhausted.
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, text: &str) -> io::Result<Option<String>> {
    write!(output, "{text}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Strips whitespace and the quotes terminals add around dragged-in paths.
pub fn clean_path_input(raw: &str) -> String {
    raw.trim().replace(['"', '\''], "")
}

pub fn is_exit_keyword(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    EXIT_KEYWORDS.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::paths::{blob_name, PrefixRange};
    use crate::{ChatMessage, UploadReceipt};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn storage() -> StorageConfig {
        StorageConfig {
            account_url: "https://acct.blob.core.windows.net".to_string(),
            container: "docs".to_string(),
        }
    }

    #[derive(Default)]
    struct FakeBlobStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        deny: bool,
    }

    #[async_trait]
    impl BlobStore for FakeBlobStore {
        async fn upload_file(
            &self,
            username: &str,
            local_path: &Path,
        ) -> Result<UploadReceipt, RagError> {
            if self.deny {
                return Err(RagError::Auth("AuthorizationPermissionMismatch".to_string()));
            }
            let key = blob_name(username, local_path)?;
            let bytes = std::fs::read(local_path)?;
            let size_bytes = bytes.len() as u64;
            self.objects
                .lock()
                .map_err(|_| RagError::InvalidArgument("poisoned".to_string()))?
                .insert(key.clone(), bytes);
            Ok(UploadReceipt {
                blob_name: key,
                url: String::new(),
                size_bytes,
                content_type: "application/pdf".to_string(),
                sha256: String::new(),
                uploaded_at: Utc::now(),
            })
        }
    }

    #[derive(Default)]
    struct FakeSearch {
        indexed: Vec<ContextDocument>,
        fail: bool,
        indexer: Option<String>,
        queries: Mutex<Vec<(String, String, usize)>>,
    }

    #[async_trait]
    impl DocumentSearch for FakeSearch {
        async fn search_user_documents(
            &self,
            username: &str,
            query: &str,
            top_k: usize,
        ) -> Result<Vec<ContextDocument>, RagError> {
            if let Ok(mut queries) = self.queries.lock() {
                queries.push((username.to_string(), query.to_string(), top_k));
            }
            if self.fail {
                return Err(RagError::Backend {
                    backend: "ai-search".to_string(),
                    details: "503 Service Unavailable".to_string(),
                });
            }
            let range = PrefixRange::for_user(&storage(), username);
            Ok(self
                .indexed
                .iter()
                .filter(|document| range.contains(&document.source))
                .take(top_k)
                .cloned()
                .collect())
        }

        async fn run_indexer(&self) -> Result<Option<String>, RagError> {
            Ok(self.indexer.clone())
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        fail: bool,
        requests: Mutex<Vec<(Vec<ChatMessage>, f64)>>,
    }

    impl FakeGenerator {
        fn request_count(&self) -> usize {
            self.requests.lock().map(|requests| requests.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl AnswerGenerator for FakeGenerator {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            temperature: f64,
        ) -> Result<String, RagError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push((messages.to_vec(), temperature));
            }
            if self.fail {
                return Err(RagError::Auth("invalid api key".to_string()));
            }
            Ok("Refunds are issued within 14 days.".to_string())
        }
    }

    fn doc(user: &str, file: &str, content: &str) -> ContextDocument {
        ContextDocument {
            content: content.to_string(),
            source: format!("https://acct.blob.core.windows.net/docs/{user}/{file}"),
        }
    }

    #[tokio::test]
    async fn empty_context_returns_fallback_without_request() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch::default(),
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        let answer = session
            .generate_rag_answer(&mut output, "anything?", &[])
            .await?;

        assert_eq!(answer, "No relevant documents found. (Did the Indexer run?)");
        assert_eq!(session.generator.request_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn generation_failure_returns_fixed_error_string() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch::default(),
            FakeGenerator {
                fail: true,
                ..Default::default()
            },
        );
        let mut output = Vec::new();

        let answer = session
            .generate_rag_answer(&mut output, "q", &[doc("alice", "a.pdf", "text")])
            .await?;

        assert_eq!(answer, "Error generating answer.");
        assert!(String::from_utf8(output)?.contains("invalid api key"));
        Ok(())
    }

    #[tokio::test]
    async fn generation_uses_fixed_temperature() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch::default(),
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        session
            .generate_rag_answer(&mut output, "q", &[doc("alice", "a.pdf", "text")])
            .await?;

        let requests = session
            .generator
            .requests
            .lock()
            .map_err(|_| "poisoned")?;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, 0.7);
        assert_eq!(requests[0].0.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn search_error_yields_empty_result() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch {
                fail: true,
                ..Default::default()
            },
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        let documents = session
            .search_documents(&mut output, "alice", "refund policy")
            .await?;

        assert!(documents.is_empty());
        assert!(String::from_utf8(output)?.contains("ERROR: Search failed."));
        Ok(())
    }

    #[tokio::test]
    async fn search_passes_top_k() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch {
                indexed: vec![
                    doc("alice", "1.pdf", "one"),
                    doc("alice", "2.pdf", "two"),
                    doc("alice", "3.pdf", "three"),
                ],
                ..Default::default()
            },
            FakeGenerator::default(),
        )
        .with_top_k(2);
        let mut output = Vec::new();

        let documents = session.search_documents(&mut output, "alice", "q").await?;

        assert_eq!(documents.len(), 2);
        let queries = session.search.queries.lock().map_err(|_| "poisoned")?;
        assert_eq!(queries[0], ("alice".to_string(), "q".to_string(), 2));
        Ok(())
    }

    #[tokio::test]
    async fn repeated_upload_overwrites_single_object() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.pdf");
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch::default(),
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        std::fs::write(&path, b"first version")?;
        assert!(session.upload_file(&mut output, "alice", &path).await?);
        std::fs::write(&path, b"second version")?;
        assert!(session.upload_file(&mut output, "alice", &path).await?);

        let objects = session.store.objects.lock().map_err(|_| "poisoned")?;
        assert_eq!(objects.len(), 1);
        assert_eq!(
            objects.get("alice/notes.pdf").map(Vec::as_slice),
            Some(&b"second version"[..])
        );
        Ok(())
    }

    #[tokio::test]
    async fn denied_upload_reports_false_with_login_hint() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF")?;
        let session = Session::new(
            FakeBlobStore {
                deny: true,
                ..Default::default()
            },
            FakeSearch::default(),
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        assert!(!session.upload_file(&mut output, "alice", &path).await?);
        let printed = String::from_utf8(output)?;
        assert!(printed.contains("Upload failed"));
        assert!(printed.contains("az login"));
        Ok(())
    }

    #[tokio::test]
    async fn successful_upload_starts_configured_indexer() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF")?;
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch {
                indexer: Some("blob-indexer".to_string()),
                ..Default::default()
            },
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        assert!(session.upload_file(&mut output, "alice", &path).await?);
        assert!(String::from_utf8(output)?.contains("Started indexer 'blob-indexer'"));
        Ok(())
    }

    #[tokio::test]
    async fn end_to_end_alice_session() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF-1.4 refund policy")?;

        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch {
                indexed: vec![
                    doc("bob", "policy.pdf", "bob only"),
                    doc("alice", "notes.pdf", "Refunds within 14 days."),
                    doc("alice-archive", "old.pdf", "stale"),
                ],
                ..Default::default()
            },
            FakeGenerator::default(),
        );

        let script = format!(
            "alice\nyes\n\"{}\"\nrefund policy\n\nEXIT\nnever asked\n",
            path.display()
        );
        let mut output = Vec::new();
        session.run(Cursor::new(script), &mut output).await?;

        let objects = session.store.objects.lock().map_err(|_| "poisoned")?;
        assert!(objects.contains_key("alice/notes.pdf"));

        let requests = session.generator.requests.lock().map_err(|_| "poisoned")?;
        assert_eq!(requests.len(), 1);
        let user_turn = &requests[0].0[1].content;
        assert!(user_turn.contains("/docs/alice/notes.pdf"));
        assert!(!user_turn.contains("/docs/bob/"));
        assert!(!user_turn.contains("alice-archive"));

        let queries = session.search.queries.lock().map_err(|_| "poisoned")?;
        assert_eq!(queries.len(), 1);

        let printed = String::from_utf8(output)?;
        assert!(printed.contains("AI ANSWER:\nRefunds are issued within 14 days."));
        assert!(printed.contains("REMINDER"));
        Ok(())
    }

    #[tokio::test]
    async fn question_without_matches_prints_fallback_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch {
                indexed: vec![doc("bob", "policy.pdf", "bob only")],
                ..Default::default()
            },
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        session
            .run(Cursor::new("alice\nno\nrefund policy\nquit\n"), &mut output)
            .await?;

        let printed = String::from_utf8(output)?;
        assert!(printed.contains("AI ANSWER:\nNo relevant documents found. (Did the Indexer run?)\n"));
        assert_eq!(session.generator.request_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn empty_username_ends_session() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch::default(),
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        session.run(Cursor::new("   \nno\nq\n"), &mut output).await?;

        assert!(session.search.queries.lock().map_err(|_| "poisoned")?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_upload_path_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::new(
            FakeBlobStore::default(),
            FakeSearch::default(),
            FakeGenerator::default(),
        );
        let mut output = Vec::new();

        session
            .run(Cursor::new("alice\ny\n/no/such/file.pdf\n"), &mut output)
            .await?;

        assert!(String::from_utf8(output)?.contains("File not found."));
        assert!(session.store.objects.lock().map_err(|_| "poisoned")?.is_empty());
        Ok(())
    }

    #[test]
    fn path_input_loses_quotes_and_whitespace() {
        assert_eq!(clean_path_input("  \"/tmp/my notes.pdf\" \n"), "/tmp/my notes.pdf");
        assert_eq!(clean_path_input("'/tmp/a.pdf'"), "/tmp/a.pdf");
    }

    #[test]
    fn exit_keywords_are_case_insensitive() {
        assert!(is_exit_keyword("exit"));
        assert!(is_exit_keyword(" QUIT "));
        assert!(!is_exit_keyword("exit now"));
        assert!(!is_exit_keyword(""));
    }
}
