use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use image::Rgba;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::canvas::{Canvas, ImageLoadError, Surface};
use crate::filter::{FilterPolicy, filter_tokens};
use crate::font::{FontResource, FontSizing, resolve_font};
use crate::ocr::{DetectedToken, OcrProvider, TextBox};
use crate::placement::{RenderPlacement, place_text};
use crate::translate::{TranslationProvider, TranslationResult, prepare_source_text};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Languages handed to the OCR engine, in its own code format.
    pub ocr_languages: String,
    pub target_lang: String,
    pub font_path: Option<PathBuf>,
    pub fallback_fonts: Vec<String>,
    pub font_sizing: FontSizing,
    pub filter: FilterPolicy,
    pub fill_color: Rgba<u8>,
    pub text_color: Rgba<u8>,
    pub max_source_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input_en.png"),
            output_path: PathBuf::from("output_zh_cn.png"),
            ocr_languages: "eng".to_string(),
            target_lang: "zh-cn".to_string(),
            font_path: Some(PathBuf::from("simsun.ttc")),
            fallback_fonts: Vec::new(),
            font_sizing: FontSizing::default(),
            filter: FilterPolicy::default(),
            fill_color: Rgba([255, 255, 255, 255]),
            text_color: Rgba([0, 0, 0, 255]),
            max_source_chars: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input image not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error(transparent)]
    LoadImage(ImageLoadError),
    #[error("failed to save output image {}: {source}", .path.display())]
    SaveImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FontOutcome {
    Loaded { family: String },
    Fallback { family: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenOutcome {
    Rendered {
        source: String,
        translated: String,
        bbox: TextBox,
        placement: RenderPlacement,
    },
    Skipped {
        source: String,
        bbox: TextBox,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub image_width: u32,
    pub image_height: u32,
    pub font_size: f32,
    pub font: FontOutcome,
    pub detected: usize,
    pub kept: usize,
    pub ocr_error: Option<String>,
    pub outcomes: Vec<TokenOutcome>,
}

impl RunReport {
    pub fn rendered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, TokenOutcome::Rendered { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.rendered_count()
    }

    /// Human readable status, one line per stage and per token.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "image: {} ({}x{})",
            self.input_path.display(),
            self.image_width,
            self.image_height
        ));
        match &self.font {
            FontOutcome::Loaded { family } => {
                lines.push(format!("font: {} ({}px)", family, self.font_size));
            }
            FontOutcome::Fallback { family, reason } => {
                lines.push(format!(
                    "font: {} ({}px, fallback: {})",
                    family, self.font_size, reason
                ));
            }
        }
        if let Some(err) = &self.ocr_error {
            lines.push(format!("ocr failed: {}", err));
        }
        lines.push(format!(
            "text regions: {} usable of {} detected",
            self.kept, self.detected
        ));
        for outcome in &self.outcomes {
            match outcome {
                TokenOutcome::Rendered {
                    source, translated, ..
                } => lines.push(format!("  translated: '{}' -> '{}'", source, translated)),
                TokenOutcome::Skipped { source, reason, .. } => {
                    lines.push(format!("  skipped: '{}' ({})", source, reason))
                }
            }
        }
        lines.push(format!(
            "saved: {} ({} translated, {} skipped)",
            self.output_path.display(),
            self.rendered_count(),
            self.skipped_count()
        ));
        lines
    }
}

/// Runs OCR, translation and redraw over a single image.
pub struct Pipeline<O, T> {
    config: PipelineConfig,
    ocr: O,
    translator: T,
}

impl<O: OcrProvider, T: TranslationProvider> Pipeline<O, T> {
    pub fn new(config: PipelineConfig, ocr: O, translator: T) -> Self {
        Self {
            config,
            ocr,
            translator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let input = &self.config.input_path;
        info!("processing image: {}", input.display());
        let mut canvas = Canvas::open(input).map_err(|err| match err {
            ImageLoadError::NotFound { path } => PipelineError::InputNotFound(path),
            other => PipelineError::LoadImage(other),
        })?;

        let font_size = self.config.font_sizing.size_for_height(canvas.height()) as f32;
        let (font, font_outcome) = self.resolve_font(font_size);

        let (detected, ocr_error) = match self
            .ocr
            .recognize(&canvas.to_rgba_image(), &self.config.ocr_languages)
        {
            Ok(tokens) => (tokens, None),
            Err(err) => {
                warn!("ocr failed, continuing without text regions: {:#}", err);
                (Vec::new(), Some(format!("{:#}", err)))
            }
        };
        let kept = filter_tokens(&detected, &self.config.filter);
        info!(
            "found {} usable text regions ({} detected)",
            kept.len(),
            detected.len()
        );

        let outcomes = self.render_tokens(&mut canvas, &kept, &font);

        let output = &self.config.output_path;
        canvas
            .save(output)
            .map_err(|source| PipelineError::SaveImage {
                path: output.clone(),
                source,
            })?;
        info!("saved result to {}", output.display());

        Ok(RunReport {
            input_path: input.clone(),
            output_path: output.clone(),
            image_width: canvas.width(),
            image_height: canvas.height(),
            font_size,
            font: font_outcome,
            detected: detected.len(),
            kept: kept.len(),
            ocr_error,
            outcomes,
        })
    }

    /// Translates each token and redraws it on `surface`, in order. A failed
    /// translation leaves that token's pixels untouched.
    pub fn render_tokens<S: Surface>(
        &self,
        surface: &mut S,
        tokens: &[DetectedToken],
        font: &FontResource,
    ) -> Vec<TokenOutcome> {
        tokens
            .iter()
            .map(|token| self.render_token(surface, token, font))
            .collect()
    }

    fn render_token<S: Surface>(
        &self,
        surface: &mut S,
        token: &DetectedToken,
        font: &FontResource,
    ) -> TokenOutcome {
        let source = prepare_source_text(&token.text, self.config.max_source_chars);
        let result = match self.translate(&source) {
            Ok(result) => result,
            Err(err) => {
                warn!("translation failed for '{}': {:#}", preview(&source), err);
                return TokenOutcome::Skipped {
                    source,
                    bbox: token.bbox,
                    reason: format!("{:#}", err),
                };
            }
        };

        surface.erase(&token.bbox, self.config.fill_color);
        let placement = place_text(&token.bbox, font.measure(&result.translated_text));
        surface.draw_text(
            &result.translated_text,
            placement,
            font,
            self.config.text_color,
        );
        info!(
            "translated '{}' -> '{}'",
            result.source_text, result.translated_text
        );
        TokenOutcome::Rendered {
            source: result.source_text,
            translated: result.translated_text,
            bbox: token.bbox,
            placement,
        }
    }

    fn translate(&self, source: &str) -> Result<TranslationResult> {
        let raw = self
            .translator
            .translate(source, &self.config.target_lang)?;
        if raw.trim().is_empty() {
            return Err(anyhow!(
                "{} returned an empty translation",
                self.translator.name()
            ));
        }
        Ok(TranslationResult {
            source_text: source.to_string(),
            translated_text: raw,
        })
    }

    fn resolve_font(&self, size: f32) -> (FontResource, FontOutcome) {
        let reason = match self.config.font_path.as_deref() {
            Some(path) => match resolve_font(path, size) {
                Ok(font) => {
                    info!("font loaded: {} ({}px)", path.display(), size);
                    let family = font.family().to_string();
                    return (font, FontOutcome::Loaded { family });
                }
                Err(err) => {
                    warn!("{}; using fallback font", err);
                    err.to_string()
                }
            },
            None => "no font file configured".to_string(),
        };
        let font = FontResource::fallback(size, &self.config.fallback_fonts);
        debug!("fallback font: {}", font.family());
        let family = font.family().to_string();
        (font, FontOutcome::Fallback { family, reason })
    }
}

/// Guidance shown when the input image does not exist.
pub fn missing_input_guidance(path: &Path) -> String {
    [
        format!("input image not found: {}", path.display()),
        "place the image to translate at that path, or pass --input <PATH>".to_string(),
    ]
    .join("\n")
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(20).collect();
    if text.chars().count() > 20 {
        out.push_str("...");
    }
    out
}
