pub mod client;
pub mod parser;
pub mod prompt;

pub use client::AnalysisClient;
pub use parser::parse_reply;
pub use prompt::{build_user_prompt, SYSTEM_PROMPT};

use log::{info, warn};
use thiserror::Error;

use crate::config::Settings;
use crate::database::{AnalysisResult, AssessmentResponses};

/// Total attempts per analysis, immediate retry in between.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Incomplete input: {0}")]
    IncompleteInput(String),
    #[error("Analysis service failed: {0}")]
    Service(String),
}

/// Turns two complete response sets into a validated `AnalysisResult` by
/// prompting the external model and parsing whatever comes back.
#[derive(Clone)]
pub struct AnalysisInvoker {
    client: AnalysisClient,
}

impl AnalysisInvoker {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: AnalysisClient::new(settings),
        }
    }

    /// One attempt. The completeness precondition is checked before any
    /// network traffic; parse failures degrade to partial or empty fields
    /// rather than erroring.
    pub async fn analyze(
        &self,
        parent_responses: &AssessmentResponses,
        child_responses: &AssessmentResponses,
    ) -> Result<AnalysisResult, AnalysisError> {
        validate_input(parent_responses, child_responses)?;

        let user_prompt = build_user_prompt(parent_responses, child_responses);
        let reply = self.client.chat(SYSTEM_PROMPT, &user_prompt).await?;

        Ok(parse_reply(&reply))
    }

    /// The full failure policy: up to `MAX_ATTEMPTS` tries on service
    /// errors, then an `{error}` marker result. The marker is what the UI
    /// shows; the caller must not persist it as the stored analysis, so a
    /// later attempt can still succeed.
    pub async fn analyze_with_retry(
        &self,
        parent_responses: &AssessmentResponses,
        child_responses: &AssessmentResponses,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.analyze(parent_responses, child_responses).await {
                Ok(result) => {
                    info!("Analysis succeeded on attempt {}", attempt);
                    return Ok(result);
                }
                Err(AnalysisError::Service(message)) => {
                    warn!("Analysis attempt {}/{} failed: {}", attempt, MAX_ATTEMPTS, message);
                    last_error = message;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(AnalysisResult::error(format!(
            "Analysis failed after {} attempts: {}",
            MAX_ATTEMPTS, last_error
        )))
    }
}

fn validate_input(
    parent_responses: &AssessmentResponses,
    child_responses: &AssessmentResponses,
) -> Result<(), AnalysisError> {
    if !parent_responses.is_complete() {
        return Err(AnalysisError::IncompleteInput(
            "Parent responses are missing short or long answers".to_string(),
        ));
    }
    if !child_responses.is_complete() {
        return Err(AnalysisError::IncompleteInput(
            "Child responses are missing short or long answers".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AssessmentResponses {
        AssessmentResponses {
            short: vec!["agree".to_string()],
            long: vec!["I wish we talked more.".to_string()],
        }
    }

    fn invoker() -> AnalysisInvoker {
        // Points at a dead endpoint; tests that reach the network would
        // fail fast rather than hang.
        let mut settings = Settings::from_env();
        settings.analysis_base_url = "http://127.0.0.1:9/v1".to_string();
        AnalysisInvoker::new(&settings)
    }

    #[tokio::test]
    async fn empty_child_long_is_rejected_before_any_call() {
        let child = AssessmentResponses {
            short: vec!["agree".to_string()],
            long: vec![],
        };

        let result = invoker().analyze(&complete(), &child).await;
        assert!(matches!(result, Err(AnalysisError::IncompleteInput(_))));
    }

    #[tokio::test]
    async fn incomplete_input_is_not_retried() {
        let result = invoker()
            .analyze_with_retry(&AssessmentResponses::empty(), &complete())
            .await;
        assert!(matches!(result, Err(AnalysisError::IncompleteInput(_))));
    }
}
