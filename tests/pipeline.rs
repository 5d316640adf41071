use std::cell::RefCell;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use image::{DynamicImage, Rgba, RgbaImage};
use ocr_image_translator::{
    DetectedToken, OcrProvider, Pipeline, PipelineConfig, PipelineError, TextBox, TokenOutcome,
    TranslationProvider,
};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

struct FixedOcr {
    tokens: Vec<DetectedToken>,
    seen: RefCell<Vec<(u32, u32, String)>>,
}

impl FixedOcr {
    fn new(tokens: Vec<DetectedToken>) -> Self {
        Self {
            tokens,
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl OcrProvider for FixedOcr {
    fn recognize(&self, image: &RgbaImage, languages: &str) -> Result<Vec<DetectedToken>> {
        self.seen
            .borrow_mut()
            .push((image.width(), image.height(), languages.to_string()));
        Ok(self.tokens.clone())
    }
}

struct BrokenOcr;

impl OcrProvider for BrokenOcr {
    fn recognize(&self, _image: &RgbaImage, _languages: &str) -> Result<Vec<DetectedToken>> {
        Err(anyhow!("tesseract exploded"))
    }
}

struct Dictionary(Vec<(&'static str, &'static str)>);

impl TranslationProvider for Dictionary {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        assert_eq!(target_lang, "zh-cn");
        self.0
            .iter()
            .find(|(from, _)| *from == text)
            .map(|(_, to)| to.to_string())
            .ok_or_else(|| anyhow!("network error"))
    }
}

fn token(text: &str, confidence: f32, bbox: TextBox) -> DetectedToken {
    DetectedToken {
        text: text.to_string(),
        confidence,
        bbox,
    }
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        input_path: dir.join("input.png"),
        output_path: dir.join("output.png"),
        font_path: None,
        fallback_fonts: Vec::new(),
        ..PipelineConfig::default()
    }
}

fn write_input(path: &Path, image: RgbaImage) {
    DynamicImage::ImageRgba8(image).save(path).unwrap();
}

fn pixels_in(image: &RgbaImage, bbox: TextBox) -> Vec<Rgba<u8>> {
    let mut out = Vec::new();
    for y in bbox.top..bbox.bottom() {
        for x in bbox.left..bbox.right() {
            out.push(*image.get_pixel(x, y));
        }
    }
    out
}

fn scrub(lines: Vec<String>, dir: &Path) -> String {
    lines
        .join("\n")
        .replace(&dir.display().to_string(), "[tmp]")
}

#[test]
fn hello_becomes_nihao_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let bbox = TextBox::new(10, 10, 50, 20);
    let mut source = RgbaImage::from_pixel(200, 500, Rgba([180, 200, 220, 255]));
    for y in bbox.top..bbox.bottom() {
        for x in (bbox.left..bbox.right()).step_by(3) {
            source.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    write_input(&cfg.input_path, source);

    let ocr = FixedOcr::new(vec![
        token("Hello", 95.0, bbox),
        token("x", 99.0, TextBox::new(100, 100, 8, 8)),
        token("Blurry", 40.0, TextBox::new(100, 200, 40, 12)),
    ]);
    let translator = Dictionary(vec![("Hello", "你好")]);
    let pipeline = Pipeline::new(cfg.clone(), &ocr, translator);
    let report = pipeline.run().unwrap();

    assert_eq!(ocr.seen.borrow().as_slice(), [(200, 500, "eng".to_string())]);
    assert_eq!(report.font_size, 16.0);
    assert_eq!(report.detected, 3);
    assert_eq!(report.kept, 1);
    match &report.outcomes[0] {
        TokenOutcome::Rendered { placement, .. } => {
            assert!(placement.x >= 10.0);
            assert!(placement.y >= 10.0);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let output = image::open(&cfg.output_path).unwrap().to_rgba8();
    assert_eq!(output.dimensions(), (200, 500));
    // (10,10)-(60,30) is erased corner to corner, the drawn glyphs sit inside it
    assert_eq!(output.get_pixel(10, 10), &WHITE);
    assert_eq!(output.get_pixel(60, 10), &WHITE);
    assert_eq!(output.get_pixel(10, 30), &WHITE);
    assert_eq!(output.get_pixel(60, 30), &WHITE);
    assert_eq!(output.get_pixel(11, 29), &WHITE);
    let inside = pixels_in(&output, bbox);
    assert!(inside.iter().any(|pixel| *pixel != WHITE));
    assert!(inside.iter().all(|pixel| pixel[0] == pixel[1] && pixel[1] == pixel[2]));
    assert_eq!(output.get_pixel(61, 10), &Rgba([180, 200, 220, 255]));
    assert_eq!(output.get_pixel(10, 31), &Rgba([180, 200, 220, 255]));
    assert_eq!(output.get_pixel(104, 104), &Rgba([180, 200, 220, 255]));

    insta::assert_snapshot!(scrub(report.summary_lines(), dir.path()), @r"
    image: [tmp]/input.png (200x500)
    font: builtin (16px, fallback: no font file configured)
    text regions: 1 usable of 3 detected
      translated: 'Hello' -> '你好'
    saved: [tmp]/output.png (1 translated, 0 skipped)
    ");
}

#[test]
fn failed_token_keeps_its_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let source = RgbaImage::from_fn(120, 80, |x, y| Rgba([x as u8 * 2, y as u8 * 3, 77, 255]));
    write_input(&cfg.input_path, source.clone());

    let broken = TextBox::new(5, 5, 40, 20);
    let fine = TextBox::new(5, 40, 60, 20);
    let ocr = FixedOcr::new(vec![
        token("Hello", 90.0, broken),
        token("World", 90.0, fine),
    ]);
    let translator = Dictionary(vec![("World", "世界")]);
    let report = Pipeline::new(cfg.clone(), &ocr, translator).run().unwrap();

    assert_eq!(report.rendered_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    let output = image::open(&cfg.output_path).unwrap().to_rgba8();
    assert_eq!(pixels_in(&output, broken), pixels_in(&source, broken));
    assert_eq!(output.get_pixel(fine.left, fine.top), &WHITE);

    insta::assert_snapshot!(scrub(report.summary_lines(), dir.path()), @r"
    image: [tmp]/input.png (120x80)
    font: builtin (16px, fallback: no font file configured)
    text regions: 2 usable of 2 detected
      skipped: 'Hello' (network error)
      translated: 'World' -> '世界'
    saved: [tmp]/output.png (1 translated, 1 skipped)
    ");
}

#[test]
fn missing_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let ocr = FixedOcr::new(Vec::new());
    let err = Pipeline::new(cfg.clone(), &ocr, Dictionary(Vec::new()))
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::InputNotFound(ref path) if *path == cfg.input_path));
    assert!(!cfg.output_path.exists());
    assert!(ocr.seen.borrow().is_empty());
}

#[test]
fn corrupt_input_is_fatal_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    std::fs::write(&cfg.input_path, b"\x89PNG garbage").unwrap();
    let ocr = FixedOcr::new(Vec::new());
    let err = Pipeline::new(cfg.clone(), &ocr, Dictionary(Vec::new()))
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::LoadImage(_)));
    assert!(!cfg.output_path.exists());
}

#[test]
fn ocr_failure_still_saves_a_copy() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    write_input(&cfg.input_path, RgbaImage::from_pixel(40, 30, Rgba([1, 2, 3, 255])));
    let report = Pipeline::new(cfg.clone(), BrokenOcr, Dictionary(Vec::new()))
        .run()
        .unwrap();
    assert_eq!(report.ocr_error.as_deref(), Some("tesseract exploded"));
    let output = image::open(&cfg.output_path).unwrap().to_rgba8();
    assert_eq!(output.get_pixel(20, 15), &Rgba([1, 2, 3, 255]));
}

#[test]
fn unwritable_output_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.output_path = PathBuf::from(dir.path()).join("missing-dir").join("out.png");
    write_input(&cfg.input_path, RgbaImage::from_pixel(10, 10, WHITE));
    let err = Pipeline::new(cfg, FixedOcr::new(Vec::new()), Dictionary(Vec::new()))
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::SaveImage { .. }));
}
