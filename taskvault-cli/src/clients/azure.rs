//! Blocking Azure OpenAI chat-completions client.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

use taskvault_core::OracleEndpoint;
use taskvault_sync::{Oracle, OracleError};

/// Completion budget for one image description.
const IMAGE_MAX_TOKENS: u32 = 800;

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
    #[serde(default)]
    content: Option<String>,
}

pub struct AzureClient {
    agent: ureq::Agent,
    url: String,
    api_key: String,
}

impl AzureClient {
    pub fn new(endpoint: &OracleEndpoint<'_>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build();
        AzureClient {
            agent,
            url: chat_url(endpoint),
            api_key: endpoint.api_key.to_string(),
        }
    }

    fn chat(&self, body: Value) -> Result<String, OracleError> {
        let resp = self
            .agent
            .post(&self.url)
            .set("api-key", &self.api_key)
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(status, resp) => OracleError::Status {
                    status,
                    body: resp.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(t) => OracleError::Transport(t.to_string()),
            })?;
        let parsed: ChatResponse = resp
            .into_json()
            .map_err(|e| OracleError::Decode(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::Empty)
    }
}

fn chat_url(endpoint: &OracleEndpoint<'_>) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.endpoint.trim_end_matches('/'),
        endpoint.deployment,
        endpoint.api_version
    )
}

impl Oracle for AzureClient {
    fn complete_json(
        &self,
        instruction: &str,
        payload: &str,
        max_tokens: u32,
    ) -> Result<String, OracleError> {
        self.chat(json!({
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": payload },
            ],
            "max_tokens": max_tokens,
            "temperature": 0,
            "response_format": { "type": "json_object" },
        }))
    }

    fn analyze_image(
        &self,
        instruction: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String, OracleError> {
        let data_url = format!("data:{mime};base64,{}", BASE64.encode(image));
        self.chat(json!({
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": [
                    { "type": "text", "text": "Analyse this image." },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ] },
            ],
            "max_tokens": IMAGE_MAX_TOKENS,
            "temperature": 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_endpoint_deployment_and_version() {
        let endpoint = OracleEndpoint {
            endpoint: "https://example.openai.azure.com/",
            api_key: "k",
            api_version: "2024-06-01",
            deployment: "gpt-4o-mini",
        };
        assert_eq!(
            chat_url(&endpoint),
            "https://example.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn response_content_is_extracted() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "{\"0\": \"x\"}"}}]}"#)
                .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"0\": \"x\"}"));
    }
}
