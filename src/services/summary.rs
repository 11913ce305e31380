//! Species summary generation client
//!
//! Wraps an external chat-completions API. Input: a species label;
//! output: a free-text blob the service is asked to format as a JSON
//! stats object and a narrative summary separated by a `###` line.
//!
//! The delimiter protocol is a convention with the text generator, not a
//! guarantee of its API. `parse_stats_response` therefore degrades
//! gracefully: a missing delimiter or malformed JSON never fails the
//! pipeline, the whole response just becomes the summary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::CollaboratorError;

const USER_AGENT: &str = concat!("wildsnap/", env!("CARGO_PKG_VERSION"));

/// Delimiter the prompt asks the text generator to emit between the
/// stats object and the narrative summary
pub const STATS_DELIMITER: &str = "###";

/// Structured stats block for a species
///
/// Keys are whatever the text generator returned ("Average Lifespan",
/// "Typical Size", "Average Weight" per the prompt); values are kept as
/// raw JSON so numeric or string answers both display.
pub type SpeciesStats = serde_json::Map<String, serde_json::Value>;

/// Summary-generation collaborator
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Generate the raw two-part stats/summary text for a label
    async fn summarize(&self, label: &str) -> Result<String, CollaboratorError>;
}

/// Split a raw collaborator response into optional stats and summary text
///
/// Splits on the first `###` occurrence; the part before must parse as a
/// JSON object to count as stats. On any mismatch the entire raw text is
/// the summary and no stats are reported.
pub fn parse_stats_response(raw: &str) -> (Option<SpeciesStats>, String) {
    match raw.split_once(STATS_DELIMITER) {
        Some((stats_part, summary_part)) => {
            match serde_json::from_str::<SpeciesStats>(stats_part.trim()) {
                Ok(stats) => (Some(stats), summary_part.trim().to_string()),
                Err(_) => (None, raw.trim().to_string()),
            }
        }
        None => (None, raw.trim().to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    content: String,
}

/// HTTP client for an OpenAI-style chat-completions endpoint
pub struct HttpSummarizer {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpSummarizer {
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url,
            api_key,
            model,
        })
    }

    fn build_prompt(label: &str) -> String {
        format!(
            "Provide a factual summary of typical statistics for the species '{label}', \
             including average lifespan, typical size, and average weight in metric units. \
             Return your answer in two parts separated by a line that contains only '###'. \
             The first part should be a JSON object with keys 'Average Lifespan', \
             'Typical Size', and 'Average Weight'. \
             The second part should be a brief textual summary."
        )
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, label: &str) -> Result<String, CollaboratorError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": Self::build_prompt(label) }],
            "temperature": 0.3,
            "max_tokens": 200,
        });

        tracing::debug!(label, "querying summary API");

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == 401 {
            return Err(CollaboratorError::Api(401, "invalid API key".to_string()));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Api(status.as_u16(), error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::Parse("response had no choices".to_string()))?;

        tracing::info!(label, "summary generation successful");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_delimiter_and_valid_json() {
        let raw = "{\"Average Lifespan\": \"10 years\", \"Typical Size\": \"60 cm\", \
                   \"Average Weight\": \"6 kg\"}\n###\nThe red fox is widespread.";
        let (stats, summary) = parse_stats_response(raw);

        let stats = stats.expect("stats should parse");
        assert_eq!(
            stats.get("Average Lifespan").and_then(|v| v.as_str()),
            Some("10 years")
        );
        assert_eq!(summary, "The red fox is widespread.");
    }

    #[test]
    fn parse_without_delimiter_keeps_whole_text_as_summary() {
        let raw = "Foxes are small canids found across the northern hemisphere.";
        let (stats, summary) = parse_stats_response(raw);
        assert!(stats.is_none());
        assert_eq!(summary, raw);
    }

    #[test]
    fn parse_with_bad_json_falls_back_to_full_text() {
        let raw = "not json at all\n###\nSome summary text";
        let (stats, summary) = parse_stats_response(raw);
        assert!(stats.is_none());
        assert_eq!(summary, raw.trim());
    }

    #[test]
    fn parse_splits_on_first_delimiter_only() {
        let raw = "{\"Average Lifespan\": \"2 years\"}\n###\nPart one ### part two";
        let (stats, summary) = parse_stats_response(raw);
        assert!(stats.is_some());
        assert_eq!(summary, "Part one ### part two");
    }

    #[test]
    fn parse_with_non_object_json_is_rejected() {
        let raw = "[1, 2, 3]\n###\nList, not object";
        let (stats, summary) = parse_stats_response(raw);
        assert!(stats.is_none());
        assert_eq!(summary, raw.trim());
    }

    #[test]
    fn prompt_mentions_delimiter_and_label() {
        let prompt = HttpSummarizer::build_prompt("red_fox");
        assert!(prompt.contains("red_fox"));
        assert!(prompt.contains("'###'"));
    }
}
