use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tiny_skia::{Path as SkiaPath, PathBuilder, Rect};
use tracing::debug;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use crate::placement::{RenderPlacement, TextExtent};

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse font {}: unsupported or corrupt font data", .path.display())]
    Parse { path: PathBuf },
}

/// Scales the font with the image so large scans stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSizing {
    pub min_size: u32,
    pub divisor: u32,
}

impl Default for FontSizing {
    fn default() -> Self {
        Self {
            min_size: 16,
            divisor: 50,
        }
    }
}

impl FontSizing {
    pub fn size_for_height(&self, image_height: u32) -> u32 {
        (image_height / self.divisor.max(1)).max(self.min_size)
    }
}

#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    space_advance: u16,
    family: Option<String>,
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontFace {
    /// Picks the face named `preferred_family` from a file or collection,
    /// else the first face that parses.
    fn from_data(data: &[u8], preferred_family: Option<&str>) -> Option<Self> {
        let mut fallback = None;
        let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
        let shared = Arc::new(data.to_vec());
        for index in 0..count {
            let Some(loaded) = Self::load(&shared, index) else {
                continue;
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &loaded.family)
                && found.eq_ignore_ascii_case(preferred)
            {
                return Some(loaded);
            }
            if fallback.is_none() {
                fallback = Some(loaded);
            }
        }
        fallback
    }

    fn from_data_at(data: &[u8], index: u32) -> Option<Self> {
        Self::load(&Arc::new(data.to_vec()), index)
    }

    fn load(data: &Arc<Vec<u8>>, index: u32) -> Option<Self> {
        let face = Face::parse(data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        Some(FontFace {
            data: Arc::clone(data),
            face_index: index,
            units_per_em,
            ascender: face.ascender(),
            descender: face.descender(),
            space_advance,
            family: extract_family_name(&face),
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    fn scale(&self, size: f32) -> f32 {
        size / self.units_per_em as f32
    }

    fn advance_units(&self, face: &Face<'_>, ch: char) -> u16 {
        if ch.is_whitespace() {
            return self.space_advance;
        }
        face.glyph_index(ch)
            .and_then(|glyph| face.glyph_hor_advance(glyph))
            .unwrap_or(self.space_advance)
    }

    fn line_height_units(&self) -> f32 {
        (self.ascender as f32 - self.descender as f32).max(self.units_per_em as f32 * 0.5)
    }

    fn measure(&self, text: &str, size: f32) -> TextExtent {
        let height = self.line_height_units() * self.scale(size);
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return TextExtent {
                width: estimate_text_width_units(text) * size,
                height,
            };
        };
        let advance: u32 = text
            .chars()
            .map(|ch| self.advance_units(&face, ch) as u32)
            .sum();
        TextExtent {
            width: advance as f32 * self.scale(size),
            height,
        }
    }

    fn outline(&self, text: &str, size: f32, origin: RenderPlacement) -> Option<SkiaPath> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        let scale = self.scale(size);
        let mut sink = OutlineSink {
            builder: PathBuilder::new(),
            pen_x: origin.x,
            baseline: origin.y + self.ascender as f32 * scale,
            scale,
        };
        for ch in text.chars() {
            if !ch.is_whitespace()
                && let Some(glyph) = face.glyph_index(ch)
            {
                face.outline_glyph(glyph, &mut sink);
            }
            sink.pen_x += self.advance_units(&face, ch) as f32 * scale;
        }
        sink.builder.finish()
    }
}

/// Translates font-unit outlines (y up) into canvas pixels (y down).
struct OutlineSink {
    builder: PathBuilder,
    pen_x: f32,
    baseline: f32,
    scale: f32,
}

impl OutlineSink {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.pen_x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[derive(Debug, Clone)]
enum FontKind {
    Face(FontFace),
    /// Last resort when neither the configured file nor any system font
    /// loads: advances are estimated and each glyph is drawn as a box.
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlyphPaint {
    Fill,
    Stroke(f32),
}

pub struct GlyphRun {
    pub path: SkiaPath,
    pub paint: GlyphPaint,
}

/// A face bound to a pixel size, ready to measure and outline text.
#[derive(Debug, Clone)]
pub struct FontResource {
    kind: FontKind,
    size: f32,
}

impl FontResource {
    pub fn builtin(size: f32) -> Self {
        Self {
            kind: FontKind::Builtin,
            size,
        }
    }

    /// First of `families` found among the system fonts, else the builtin face.
    pub fn fallback(size: f32, families: &[String]) -> Self {
        if families.is_empty() {
            return Self::builtin(size);
        }
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        for family in families {
            if let Some(face) = load_face_from_family(&db, family) {
                debug!("font: using system family {}", family);
                return Self {
                    kind: FontKind::Face(face),
                    size,
                };
            }
        }
        Self::builtin(size)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, FontKind::Builtin)
    }

    pub fn family(&self) -> &str {
        match &self.kind {
            FontKind::Face(face) => face.family().unwrap_or("unnamed"),
            FontKind::Builtin => "builtin",
        }
    }

    pub fn measure(&self, text: &str) -> TextExtent {
        match &self.kind {
            FontKind::Face(face) => face.measure(text, self.size),
            FontKind::Builtin => TextExtent {
                width: estimate_text_width_units(text) * self.size,
                height: self.size,
            },
        }
    }

    /// Outlines `text` with its top-left corner at `origin`.
    pub fn glyph_run(&self, text: &str, origin: RenderPlacement) -> Option<GlyphRun> {
        match &self.kind {
            FontKind::Face(face) => face.outline(text, self.size, origin).map(|path| GlyphRun {
                path,
                paint: GlyphPaint::Fill,
            }),
            FontKind::Builtin => builtin_boxes(text, self.size, origin).map(|path| GlyphRun {
                path,
                paint: GlyphPaint::Stroke((self.size / 16.0).max(1.0)),
            }),
        }
    }
}

pub fn resolve_font(path: &Path, size: f32) -> Result<FontResource, FontError> {
    let data = std::fs::read(path).map_err(|source| FontError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let face = FontFace::from_data(&data, None).ok_or_else(|| FontError::Parse {
        path: path.to_path_buf(),
    })?;
    Ok(FontResource {
        kind: FontKind::Face(face),
        size,
    })
}

fn load_face_from_family(db: &fontdb::Database, family: &str) -> Option<FontFace> {
    let families = match family.to_ascii_lowercase().as_str() {
        "sans-serif" => vec![fontdb::Family::SansSerif],
        "serif" => vec![fontdb::Family::Serif],
        "monospace" => vec![fontdb::Family::Monospace],
        _ => vec![fontdb::Family::Name(family)],
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db.query(&query)?;
    let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    FontFace::from_data_at(&data, index).or_else(|| FontFace::from_data(&data, Some(family)))
}

fn builtin_boxes(text: &str, size: f32, origin: RenderPlacement) -> Option<SkiaPath> {
    let mut builder = PathBuilder::new();
    let mut pen_x = origin.x;
    let inset = size * 0.1;
    for ch in text.chars() {
        let advance = estimate_char_units(ch) * size;
        if !ch.is_whitespace()
            && let Some(rect) = Rect::from_xywh(
                pen_x + inset,
                origin.y + inset,
                (advance - inset * 2.0).max(1.0),
                (size - inset * 2.0).max(1.0),
            )
        {
            builder.push_rect(rect);
        }
        pen_x += advance;
    }
    builder.finish()
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units).sum()
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn size_scales_with_height_and_has_a_floor() {
        let sizing = FontSizing::default();
        assert_eq!(sizing.size_for_height(500), 16);
        assert_eq!(sizing.size_for_height(10), 16);
        assert_eq!(sizing.size_for_height(849), 16);
        assert_eq!(sizing.size_for_height(850), 17);
        assert_eq!(sizing.size_for_height(2000), 40);
    }

    #[test]
    fn zero_divisor_does_not_panic() {
        let sizing = FontSizing {
            min_size: 12,
            divisor: 0,
        };
        assert_eq!(sizing.size_for_height(30), 30);
    }

    #[test]
    fn missing_font_is_a_read_error() {
        let err = resolve_font(Path::new("/nonexistent/simsun.ttc"), 16.0).unwrap_err();
        assert!(matches!(err, FontError::Read { .. }));
        assert!(err.to_string().contains("simsun.ttc"));
    }

    #[test]
    fn garbage_font_is_a_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".ttf").tempfile().unwrap();
        file.write_all(b"definitely not a font").unwrap();
        let err = resolve_font(file.path(), 16.0).unwrap_err();
        assert!(matches!(err, FontError::Parse { .. }));
    }

    #[test]
    fn builtin_measures_by_estimate() {
        let font = FontResource::builtin(16.0);
        assert!(font.is_builtin());
        assert_eq!(font.family(), "builtin");
        assert_eq!(
            font.measure("你好"),
            TextExtent {
                width: 32.0,
                height: 16.0
            }
        );
        let ascii = font.measure("ab");
        assert!((ascii.width - 17.6).abs() < 1e-3);
    }

    #[test]
    fn builtin_draws_boxes_except_for_spaces() {
        let font = FontResource::builtin(20.0);
        let origin = RenderPlacement { x: 10.0, y: 10.0 };
        let run = font.glyph_run("a b", origin).unwrap();
        assert!(matches!(run.paint, GlyphPaint::Stroke(_)));
        let bounds = run.path.bounds();
        assert!(bounds.left() >= 10.0);
        assert!(bounds.top() >= 10.0);
        assert!(font.glyph_run("   ", origin).is_none());
    }

    fn system_sans_serif() -> Option<(Vec<u8>, u32)> {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let id = db.query(&fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..Default::default()
        })?;
        db.with_face_data(id, |data, index| (data.to_vec(), index))
    }

    #[test]
    fn system_face_measures_with_real_metrics() {
        let font = FontResource::fallback(16.0, &["sans-serif".to_string()]);
        // hosts without any system font only have the builtin face
        let FontKind::Face(face) = &font.kind else {
            return;
        };
        let parsed = Face::parse(&face.data, face.face_index).unwrap();
        let advance: u32 = "Hello"
            .chars()
            .map(|ch| {
                parsed
                    .glyph_index(ch)
                    .and_then(|glyph| parsed.glyph_hor_advance(glyph))
                    .unwrap_or(face.space_advance) as u32
            })
            .sum();
        let scale = 16.0 / face.units_per_em as f32;

        let extent = font.measure("Hello");
        assert!(extent.width > 0.0);
        assert!((extent.width - advance as f32 * scale).abs() < 1e-3);
        let line = (face.ascender as f32 - face.descender as f32) * scale;
        assert!((extent.height - line).abs() < 1e-3);
    }

    #[test]
    fn system_face_draws_below_the_origin_on_the_baseline() {
        let font = FontResource::fallback(16.0, &["sans-serif".to_string()]);
        let FontKind::Face(face) = &font.kind else {
            return;
        };
        let origin = RenderPlacement { x: 5.0, y: 7.0 };
        let run = font.glyph_run("Hello", origin).unwrap();
        assert_eq!(run.paint, GlyphPaint::Fill);

        let baseline = origin.y + face.ascender as f32 * 16.0 / face.units_per_em as f32;
        let bounds = run.path.bounds();
        assert!(bounds.left() >= origin.x - 0.5);
        assert!(bounds.top() >= origin.y - 0.5);
        assert!(bounds.top() < baseline);
        // outlines are y-up, so an unflipped run would rise above the baseline
        assert!((bounds.bottom() - baseline).abs() < 1.0);
        assert!(bounds.right() <= origin.x + font.measure("Hello").width + 1.0);
    }

    #[test]
    fn configured_font_file_loads() {
        let Some((data, index)) = system_sans_serif() else {
            return;
        };
        let mut file = tempfile::Builder::new().suffix(".ttf").tempfile().unwrap();
        file.write_all(&data).unwrap();

        let font = resolve_font(file.path(), 20.0).unwrap();
        assert!(!font.is_builtin());
        assert_eq!(font.size(), 20.0);
        assert!(font.measure("Hi").width > 0.0);
        let expected = FontFace::from_data(&data, None).unwrap();
        assert_eq!(font.family(), expected.family().unwrap_or("unnamed"));
        assert_eq!(FontFace::from_data_at(&data, index).unwrap().face_index, index);
    }

    #[test]
    fn collection_face_is_chosen_by_family() {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let collection = db
            .faces()
            .filter(|info| info.index > 0)
            .find_map(|info| db.with_face_data(info.id, |data, _| data.to_vec()));
        let Some(data) = collection else {
            return;
        };

        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let mut seen: Vec<String> = Vec::new();
        let mut target = None;
        for index in 0..count {
            let Some(family) = FontFace::from_data_at(&data, index).and_then(|face| face.family)
            else {
                continue;
            };
            let fresh = !seen.iter().any(|name| name.eq_ignore_ascii_case(&family));
            if fresh && index > 0 {
                target = Some((index, family.clone()));
            }
            seen.push(family);
        }
        let Some((index, family)) = target else {
            return;
        };

        let chosen = FontFace::from_data(&data, Some(&family)).unwrap();
        assert_eq!(chosen.face_index, index);
        assert_eq!(FontFace::from_data(&data, None).unwrap().face_index, 0);
    }

    #[test]
    fn fallback_without_families_is_builtin() {
        let font = FontResource::fallback(18.0, &[]);
        assert!(font.is_builtin());
        assert_eq!(font.size(), 18.0);
    }
}
