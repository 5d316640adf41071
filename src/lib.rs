use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub mod canvas;
pub mod filter;
pub mod font;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod placement;
pub mod settings;
pub mod translate;

pub use canvas::{Canvas, ImageLoadError, Surface};
pub use filter::{FilterPolicy, filter_tokens};
pub use font::{FontError, FontResource, FontSizing, resolve_font};
pub use ocr::{DetectedToken, OcrProvider, TesseractOcr, TextBox};
pub use pipeline::{
    FontOutcome, Pipeline, PipelineConfig, PipelineError, RunReport, TokenOutcome,
};
pub use placement::{RenderPlacement, TextExtent, place_text};
pub use settings::Settings;
pub use translate::{TranslationProvider, TranslationResult};

/// Command line overrides; `None` keeps the value from settings.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: Option<String>,
    pub output: Option<String>,
    pub lang: Option<String>,
    pub source_lang: Option<String>,
    pub font: Option<String>,
    pub provider: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
}

/// Runs one translation pass and returns the text to print.
pub fn run(config: Config) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref().map(Path::new))?;
    let pipeline_config = build_pipeline_config(&config, &settings)?;
    if !pipeline_config.input_path.exists() {
        return Ok(pipeline::missing_input_guidance(&pipeline_config.input_path));
    }

    let provider_arg = config.provider.as_deref().unwrap_or(&settings.provider);
    let selection = translate::parse_provider_arg(provider_arg)?;
    let key = translate::resolve_key(selection.provider, config.key.as_deref())?;
    let translator = translate::build_provider(&selection, key)
        .with_context(|| "failed to build translation provider")?;
    let ocr = TesseractOcr::new(&settings.tesseract_path);

    let pipeline = Pipeline::new(pipeline_config, ocr, translator);
    match pipeline.run() {
        Ok(report) => Ok(report.summary_lines().join("\n")),
        Err(PipelineError::InputNotFound(path)) => Ok(pipeline::missing_input_guidance(&path)),
        Err(err) => Err(err.into()),
    }
}

pub fn build_pipeline_config(config: &Config, settings: &Settings) -> Result<PipelineConfig> {
    let pick = |flag: &Option<String>, fallback: &str| -> String {
        flag.as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let font_path = config
        .font
        .as_deref()
        .or(settings.font_path.as_deref())
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);

    Ok(PipelineConfig {
        input_path: PathBuf::from(pick(&config.input, &settings.input_path)),
        output_path: PathBuf::from(pick(&config.output, &settings.output_path)),
        ocr_languages: pick(&config.source_lang, &settings.ocr_languages),
        target_lang: pick(&config.lang, &settings.target_lang),
        font_path,
        fallback_fonts: settings.fallback_fonts.clone(),
        font_sizing: FontSizing {
            min_size: settings.min_font_size,
            divisor: settings.font_size_divisor,
        },
        filter: FilterPolicy {
            min_confidence: settings.min_confidence,
            min_chars: settings.min_chars,
        },
        fill_color: settings::parse_hex_color(&settings.fill_color)
            .with_context(|| "invalid [render] fill_color")?,
        text_color: settings::parse_hex_color(&settings.text_color)
            .with_context(|| "invalid [render] text_color")?,
        max_source_chars: settings.max_source_chars,
    })
}
