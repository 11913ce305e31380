//! Image classification client
//!
//! Wraps an external pretrained image-classification model served over
//! HTTP. Input: image bytes; output: a single species label string.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::CollaboratorError;

const USER_AGENT: &str = concat!("wildsnap/", env!("CARGO_PKG_VERSION"));

/// Species classification collaborator
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify an image, returning a label such as "red_fox"
    async fn classify(&self, image: &[u8], filename: &str) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
}

/// HTTP client for the classification service
///
/// POSTs the image as a multipart `file` part to `{base_url}/classify`
/// and expects `{"label": "..."}` back.
pub struct HttpClassifier {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &[u8], filename: &str) -> Result<String, CollaboratorError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(filename, bytes = image.len(), "querying classifier");

        let response = self
            .http_client
            .post(format!("{}/classify", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api(status.as_u16(), error_text));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        if parsed.label.trim().is_empty() {
            return Err(CollaboratorError::Parse("empty label".to_string()));
        }

        tracing::info!(label = %parsed.label, "classification successful");
        Ok(parsed.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_strips_trailing_slash() {
        let client =
            HttpClassifier::new("http://localhost:8501/".to_string(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url, "http://localhost:8501");
    }
}
