use anyhow::{Context, Result, anyhow};
use image::Rgba;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub input_path: String,
    pub output_path: String,
    pub tesseract_path: String,
    pub ocr_languages: String,
    pub provider: String,
    pub target_lang: String,
    pub max_source_chars: usize,
    pub font_path: Option<String>,
    pub fallback_fonts: Vec<String>,
    pub fill_color: String,
    pub text_color: String,
    pub min_font_size: u32,
    pub font_size_divisor: u32,
    pub min_confidence: f32,
    pub min_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_path: "input_en.png".to_string(),
            output_path: "output_zh_cn.png".to_string(),
            tesseract_path: "tesseract".to_string(),
            ocr_languages: "eng".to_string(),
            provider: "google".to_string(),
            target_lang: "zh-cn".to_string(),
            max_source_chars: 200,
            font_path: None,
            fallback_fonts: Vec::new(),
            fill_color: "#ffffff".to_string(),
            text_color: "#000000".to_string(),
            min_font_size: 16,
            font_size_divisor: 50,
            min_confidence: 60.0,
            min_chars: 1,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    paths: Option<PathSettings>,
    ocr: Option<OcrSettings>,
    translation: Option<TranslationSettings>,
    render: Option<RenderSettings>,
    filter: Option<FilterSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct PathSettings {
    input: Option<String>,
    output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    tesseract_path: Option<String>,
    languages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    provider: Option<String>,
    target_lang: Option<String>,
    max_source_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_path: Option<String>,
    fallback_fonts: Option<Vec<String>>,
    fill_color: Option<String>,
    text_color: Option<String>,
    min_font_size: Option<u32>,
    font_size_divisor: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterSettings {
    min_confidence: Option<f32>,
    min_chars: Option<usize>,
}

/// Layers the embedded defaults, the working directory, the home directory
/// and finally `extra_path`. Later files win per key.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge_str(DEFAULT_SETTINGS_TOML, Path::new("<embedded settings.toml>"))?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content, &path)?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str, origin: &Path) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)
            .with_context(|| format!("failed to parse settings: {}", origin.display()))?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(paths) = incoming.paths {
            if let Some(input) = non_empty(paths.input) {
                self.input_path = input;
            }
            if let Some(output) = non_empty(paths.output) {
                self.output_path = output;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(path) = non_empty(ocr.tesseract_path) {
                self.tesseract_path = path;
            }
            if let Some(languages) = non_empty(ocr.languages) {
                self.ocr_languages = languages;
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(provider) = non_empty(translation.provider) {
                self.provider = provider;
            }
            if let Some(lang) = non_empty(translation.target_lang) {
                self.target_lang = lang;
            }
            if let Some(max) = translation.max_source_chars {
                self.max_source_chars = max;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(path) = render.font_path {
                // an explicit empty string disables the font file
                self.font_path = Some(path).filter(|p| !p.trim().is_empty());
            }
            if let Some(fonts) = render.fallback_fonts {
                self.fallback_fonts = fonts
                    .into_iter()
                    .filter(|font| !font.trim().is_empty())
                    .collect();
            }
            if let Some(color) = non_empty(render.fill_color) {
                self.fill_color = color;
            }
            if let Some(color) = non_empty(render.text_color) {
                self.text_color = color;
            }
            if let Some(size) = render.min_font_size.filter(|size| *size > 0) {
                self.min_font_size = size;
            }
            if let Some(divisor) = render.font_size_divisor.filter(|d| *d > 0) {
                self.font_size_divisor = divisor;
            }
        }
        if let Some(filter) = incoming.filter {
            if let Some(conf) = filter.min_confidence {
                self.min_confidence = conf;
            }
            if let Some(chars) = filter.min_chars {
                self.min_chars = chars;
            }
        }
    }
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    let hex = value.trim().trim_start_matches('#');
    let digits = hex
        .chars()
        .map(|ch| ch.to_digit(16).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| anyhow!("invalid color '{}'", value))?;
    match digits.as_slice() {
        [r, g, b] => Ok(Rgba([r * 17, g * 17, b * 17, 255])),
        [r1, r2, g1, g2, b1, b2] => Ok(Rgba([r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2, 255])),
        [r1, r2, g1, g2, b1, b2, a1, a2] => Ok(Rgba([
            r1 * 16 + r2,
            g1 * 16 + g2,
            b1 * 16 + b2,
            a1 * 16 + a2,
        ])),
        _ => Err(anyhow!("invalid color '{}'", value)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-image-translator"))
        }
    })
}
