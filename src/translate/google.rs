use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use super::TranslationProvider;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

/// Keyless Google web translation endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: Client,
    endpoint: String,
}

impl Default for GoogleTranslate {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleTranslate {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl TranslationProvider for GoogleTranslate {
    fn name(&self) -> &str {
        "google"
    }

    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let target = google_lang_code(target_lang);
        let response = self
            .client
            .get(&self.endpoint)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .with_context(|| "failed to reach Google Translate")?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("Google Translate error ({})", status));
        }
        parse_google_response(&body)
    }
}

/// Maps common lowercase codes to the casing Google expects (`zh-cn` -> `zh-CN`).
pub(crate) fn google_lang_code(code: &str) -> String {
    let trimmed = code.trim();
    match trimmed.split_once(['-', '_']) {
        Some((base, region)) if region.len() == 2 => {
            format!("{}-{}", base.to_lowercase(), region.to_uppercase())
        }
        Some((base, script)) => format!("{}-{}", base.to_lowercase(), script),
        None => trimmed.to_lowercase(),
    }
}

/// The endpoint answers with nested arrays; `[0][i][0]` are the translated
/// sentence chunks.
pub(crate) fn parse_google_response(body: &str) -> Result<String> {
    let value: Value =
        serde_json::from_str(body).with_context(|| "failed to parse Google Translate response")?;
    let chunks = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("unexpected Google Translate response shape"))?;
    let mut out = String::new();
    for chunk in chunks {
        if let Some(part) = chunk.get(0).and_then(Value::as_str) {
            out.push_str(part);
        }
    }
    Ok(out)
}
