use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::languages::Language;

use super::{TOOL_NAME, TranslationRequest, TranslationService, render_system_prompt, tool_spec};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions client for any OpenAI-compatible endpoint. A forced
/// tool call keeps the reply machine-readable; there are no automatic
/// retries, a failed call fails the run.
#[derive(Debug, Clone)]
pub struct LlmTranslator {
    key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmTranslator {
    pub fn new(key: impl Into<String>) -> LlmTranslator {
        LlmTranslator {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> LlmTranslator {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL")
        .ok()
        .map(|value| value.trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

#[async_trait]
impl TranslationService for LlmTranslator {
    async fn translate_batch(
        &self,
        requests: &[TranslationRequest],
        target: &Language,
    ) -> Result<Vec<String>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let system_prompt = render_system_prompt(target)?;
        let sources: Vec<&str> = requests
            .iter()
            .map(|request| request.source_text.as_str())
            .collect();
        let user_payload =
            serde_json::to_string(&sources).with_context(|| "failed to encode source texts")?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_payload }
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": TOOL_NAME,
                    "description": "Return the translated strings in source order.",
                    "parameters": tool_spec()
                }
            }],
            "tool_choice": { "type": "function", "function": { "name": TOOL_NAME } }
        });

        let url = format!("{}/chat/completions", base_url());
        debug!(model = self.model.as_str(), batch = requests.len(), "requesting translations");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.key)
            .json(&body)
            .send()
            .await
            .with_context(|| "translation request failed")?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let detail = extract_api_error(&text).unwrap_or(text);
            return Err(anyhow!("translation API error ({}): {}", status, detail));
        }
        extract_translations(&text)
    }
}

fn extract_translations(text: &str) -> Result<Vec<String>> {
    let payload: ChatResponse =
        serde_json::from_str(text).with_context(|| "failed to parse translation response JSON")?;
    let tool_call = payload
        .choices
        .first()
        .and_then(|choice| choice.message.tool_calls.first())
        .ok_or_else(|| anyhow!("no tool call in translation response"))?;
    if tool_call.function.name != TOOL_NAME {
        return Err(anyhow!(
            "unexpected tool '{}' in translation response",
            tool_call.function.name
        ));
    }
    let arguments: ToolArguments = serde_json::from_str(&tool_call.function.arguments)
        .with_context(|| "failed to parse translation tool arguments")?;
    Ok(arguments.translations)
}

fn extract_api_error(text: &str) -> Option<String> {
    let payload: ApiErrorBody = serde_json::from_str(text).ok()?;
    payload.error?.message
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ToolArguments {
    translations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}
