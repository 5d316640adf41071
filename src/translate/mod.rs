use anyhow::{Result, anyhow};

mod google;
mod openai;

pub use google::GoogleTranslate;
pub use openai::OpenAi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub source_text: String,
    pub translated_text: String,
}

/// A blocking translation backend. One call per token, no retries.
pub trait TranslationProvider {
    fn name(&self) -> &str;

    fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
}

impl<T: TranslationProvider + ?Sized> TranslationProvider for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        (**self).translate(text, target_lang)
    }
}

impl<T: TranslationProvider + ?Sized> TranslationProvider for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        (**self).translate(text, target_lang)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub provider: ProviderKind,
    pub requested_model: Option<String>,
}

/// Parses `google`, `openai` or `openai:MODEL`.
pub fn parse_provider_arg(value: &str) -> Result<ProviderSelection> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err(anyhow!("translation provider is empty"));
    }
    let (name, model) = match raw.split_once(':') {
        Some((name, model)) => (name, Some(model.trim()).filter(|m| !m.is_empty())),
        None => (raw, None),
    };
    let provider = match name.trim().to_lowercase().as_str() {
        "google" | "gtx" => ProviderKind::Google,
        "openai" => ProviderKind::OpenAi,
        other => {
            return Err(anyhow!(
                "unknown translation provider '{}' (expected google or openai[:model])",
                other
            ));
        }
    };
    if provider == ProviderKind::Google && model.is_some() {
        return Err(anyhow!("the google provider does not take a model"));
    }
    Ok(ProviderSelection {
        provider,
        requested_model: model.map(|m| m.to_string()),
    })
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Result<Option<String>> {
    if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
        return Ok(Some(key.to_string()));
    }
    match provider {
        ProviderKind::Google => Ok(None),
        ProviderKind::OpenAi => get_env("OPENAI_API_KEY")
            .map(Some)
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set (or pass --key)")),
    }
}

pub fn build_provider(
    selection: &ProviderSelection,
    key: Option<String>,
) -> Result<Box<dyn TranslationProvider>> {
    match selection.provider {
        ProviderKind::Google => Ok(Box::new(GoogleTranslate::new())),
        ProviderKind::OpenAi => {
            let key = key.ok_or_else(|| anyhow!("openai provider requires an API key"))?;
            let mut provider = OpenAi::new(key);
            if let Some(model) = selection.requested_model.as_deref() {
                provider = provider.with_model(model);
            }
            Ok(Box::new(provider))
        }
    }
}

/// Trims and caps the text sent to the provider, counting characters.
pub fn prepare_source_text(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if max_chars == 0 {
        return trimmed.to_string();
    }
    trimmed.chars().take(max_chars).collect()
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
