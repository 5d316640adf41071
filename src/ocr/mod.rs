mod parse;
mod tesseract;

use anyhow::Result;
use image::RgbaImage;
use serde::Serialize;

pub use parse::parse_tsv_tokens;
pub use tesseract::{TesseractOcr, list_tesseract_languages};

/// Axis-aligned pixel rectangle reported by the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl TextBox {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedToken {
    pub text: String,
    pub confidence: f32,
    pub bbox: TextBox,
}

pub trait OcrProvider {
    /// Runs recognition over the whole image. `languages` uses the engine's
    /// own language codes (e.g. `eng`, `eng+deu`).
    fn recognize(&self, image: &RgbaImage, languages: &str) -> Result<Vec<DetectedToken>>;
}

impl<T: OcrProvider + ?Sized> OcrProvider for &T {
    fn recognize(&self, image: &RgbaImage, languages: &str) -> Result<Vec<DetectedToken>> {
        (**self).recognize(image, languages)
    }
}
