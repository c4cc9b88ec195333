use crate::error::RagError;
use reqwest::Response;

pub(crate) async fn ensure_success(response: Response, backend: &str) -> Result<Response, RagError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RagError::from_status(backend, status, &body))
}
