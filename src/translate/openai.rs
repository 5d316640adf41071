use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::TranslationProvider;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub(crate) const TOOL_NAME: &str = "deliver_translation";

/// Chat completions backend; the reply is forced through a single tool call
/// so the translation never arrives wrapped in commentary.
#[derive(Debug, Clone)]
pub struct OpenAi {
    client: Client,
    key: String,
    model: String,
    base_url: String,
}

impl OpenAi {
    pub fn new(key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, text: &str, target_lang: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt(target_lang)},
                {"role": "user", "content": text}
            ],
            "tools": [
                {
                    "type": "function",
                    "function": {
                        "name": TOOL_NAME,
                        "description": "Return the translated text.",
                        "parameters": {
                            "type": "object",
                            "properties": {
                                "translation": {"type": "string"}
                            },
                            "required": ["translation"]
                        }
                    }
                }
            ],
            "tool_choice": {"type": "function", "function": {"name": TOOL_NAME}}
        })
    }
}

impl TranslationProvider for OpenAi {
    fn name(&self) -> &str {
        "openai"
    }

    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.key)
            .json(&self.request_body(text, target_lang))
            .send()
            .with_context(|| "failed to reach OpenAI")?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!(
                "OpenAI API error ({}): {}",
                status,
                extract_openai_error(&body).unwrap_or(body)
            ));
        }
        let response = extract_tool_response(&body, TOOL_NAME, &self.model)?;
        debug!("openai: translated with {}", response.model);
        Ok(response.translation)
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn system_prompt(target_lang: &str) -> String {
    format!(
        "You translate short text fragments recognized in an image. \
         Translate the user's text into the language with code '{}'. \
         Keep it as short as the source, do not add explanations, \
         and call {} with the result.",
        target_lang, TOOL_NAME
    )
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolTranslation {
    pub(crate) translation: String,
    pub(crate) model: String,
}

pub(crate) fn extract_tool_response(
    text: &str,
    tool_name: &str,
    fallback_model: &str,
) -> Result<ToolTranslation> {
    let payload: OpenAiResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let tool_call = payload
        .choices
        .first()
        .and_then(|choice| choice.message.tool_calls.first())
        .ok_or_else(|| anyhow!("no tool call returned from OpenAI"))?;

    if tool_call.function.name != tool_name {
        return Err(anyhow!(
            "unexpected tool name '{}' from OpenAI",
            tool_call.function.name
        ));
    }

    let args: ToolArgs = serde_json::from_str(&tool_call.function.arguments)
        .with_context(|| "failed to parse OpenAI tool arguments")?;
    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| fallback_model.to_string());
    Ok(ToolTranslation {
        translation: args.translation,
        model,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAiError>,
    }

    #[derive(Deserialize)]
    struct OpenAiError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    let mut parts = Vec::new();
    if let Some(message) = error.message.filter(|m| !m.trim().is_empty()) {
        parts.push(message);
    }
    if let Some(kind) = error.kind.filter(|k| !k.trim().is_empty()) {
        parts.push(format!("type: {}", kind));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    translation: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}
