//! ALFA Media Vault - OpenAI-compatible Vision Client
//!
//! Blocking chat-completions client used as the default [`VisionAnalyzer`].

use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analyzer::{PreparedImage, VisionAnalyzer};
use crate::error::{VaultError, VaultResult};

/// Vision client bound to one endpoint, key and model
pub struct OpenAiVision {
    client: Client,
    api_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiVision {
    pub fn new(
        api_url: &str,
        api_key: SecretString,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> VaultResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            max_tokens,
        })
    }

    /// Model ids served by the endpoint. Doubles as the connection test.
    pub fn list_models(&self) -> VaultResult<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/models", self.api_url))
            .bearer_auth(self.api_key.expose_secret())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VaultError::VisionFailed(format!("HTTP {}: {}", status, body)));
        }

        let models: ModelList = response.json()?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}

impl VisionAnalyzer for OpenAiVision {
    fn model(&self) -> &str {
        &self.model
    }

    fn analyze(&self, image: &PreparedImage, prompt: &str) -> VaultResult<String> {
        let body = chat_request_body(&self.model, prompt, &image.data_uri(), self.max_tokens);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VaultError::VisionFailed(format!("HTTP {}: {}", status, body)));
        }

        parse_chat_response(&response.text()?)
    }
}

/// Single user message carrying the prompt and the image as a data URI
pub fn chat_request_body(model: &str, prompt: &str, image_url: &str, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                { "type": "image_url", "image_url": { "url": image_url } }
            ]
        }],
        "max_tokens": max_tokens
    })
}

/// `choices[0].message.content`
pub fn parse_chat_response(body: &str) -> VaultResult<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| VaultError::VisionFailed(format!("malformed response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| VaultError::VisionFailed("response has no message content".into()))
}
