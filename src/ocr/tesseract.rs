use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use super::parse::parse_tsv_tokens;
use super::{DetectedToken, OcrProvider};

const DEFAULT_PAGE_SEGMENTATION: u32 = 3;

/// OCR backed by the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    psm: u32,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            psm: DEFAULT_PAGE_SEGMENTATION,
        }
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn tsv_args(&self, image_path: &Path, languages: &str) -> Vec<String> {
        vec![
            image_path.display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            languages.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "tsv".to_string(),
        ]
    }

    fn run_tsv(&self, image_path: &Path, languages: &str) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(self.tsv_args(image_path, languages))
            .output()
            .with_context(|| {
                format!(
                    "failed to run {} (is it installed?)",
                    self.binary.display()
                )
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrProvider for TesseractOcr {
    fn recognize(&self, image: &RgbaImage, languages: &str) -> Result<Vec<DetectedToken>> {
        let languages = normalize_ocr_languages(&self.binary, languages)?;
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush()
            .with_context(|| "failed to flush temp image for OCR")?;

        debug!("ocr: running {} -l {}", self.binary.display(), languages);
        let tsv = self.run_tsv(tmp.path(), &languages)?;
        Ok(parse_tsv_tokens(&tsv))
    }
}

pub fn list_tesseract_languages(binary: &Path) -> Result<Vec<String>> {
    let output = Command::new(binary)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", binary.display()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_language_list(&stdout))
}

fn parse_language_list(stdout: &str) -> Vec<String> {
    let mut langs = Vec::new();
    for (idx, line) in stdout.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let value = line.trim();
        if !value.is_empty() {
            langs.push(value.to_string());
        }
    }
    langs
}

fn normalize_ocr_languages(binary: &Path, requested: &str) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let available = match list_tesseract_languages(binary) {
        Ok(list) => list,
        Err(_) => return Ok(trimmed.to_string()),
    };
    select_languages(trimmed, &available)
}

fn select_languages(requested: &str, available: &[String]) -> Result<String> {
    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in requested.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}
