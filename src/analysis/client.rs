use log::{error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::AnalysisError;
use crate::config::Settings;

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Thin client for an OpenAI-compatible chat-completions endpoint
/// (OpenRouter in production, a local model server in development).
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnalysisClient {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: settings.analysis_base_url.clone(),
            api_key: settings.openrouter_api_key.clone(),
            model: settings.analysis_model.clone(),
        }
    }

    /// One request/response cycle. Transport failures and non-2xx replies
    /// are retryable `Service` errors; so is an empty completion.
    pub async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: 1000,
            temperature: 0.7,
            stream: false,
        };

        info!("Sending analysis request with model: {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Service(format!("Analysis request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Analysis service error {}: {}", status, error_text);
            return Err(AnalysisError::Service(format!(
                "Analysis service error {}: {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Service(format!("Invalid analysis response: {}", e)))?;

        let content = chat_response
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(AnalysisError::Service(
                "Analysis service returned an empty reply".to_string(),
            ));
        }

        info!("Received analysis reply: {} characters", content.len());
        Ok(content)
    }
}
