//! External collaborator interfaces
//!
//! The application delegates all "intelligence" to two external services:
//! an image classifier and a text-generation API. Both are behind traits
//! so handlers depend on `Arc<dyn …>` injected through `AppState`, and
//! tests can substitute deterministic fakes.

pub mod classifier;
pub mod summary;

pub use classifier::{Classifier, HttpClassifier};
pub use summary::{parse_stats_response, HttpSummarizer, SpeciesStats, Summarizer};

use thiserror::Error;

/// Errors from either collaborator
///
/// These abort the upload pipeline before any database write; the user
/// sees a generic flash and may re-submit.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network-level failure, including timeouts
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the service
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        CollaboratorError::Network(e.to_string())
    }
}
