use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use thiserror::Error;
use tiny_skia::{FillRule, IntSize, Paint, Pixmap, Rect, Stroke, Transform};

use crate::font::{FontResource, GlyphPaint};
use crate::ocr::TextBox;
use crate::placement::RenderPlacement;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("input image not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read image {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image has no pixels: {}", .path.display())]
    Empty { path: PathBuf },
}

/// Drawing operations the pipeline needs from an image.
pub trait Surface {
    /// Paints `region` with a solid color, including the pixel row and column
    /// at `left + width` and `top + height`. Parts outside the surface are
    /// clipped.
    fn erase(&mut self, region: &TextBox, fill: Rgba<u8>);

    fn draw_text(&mut self, text: &str, at: RenderPlacement, font: &FontResource, color: Rgba<u8>);
}

/// Opaque RGBA pixel buffer edited in place.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    pub fn open(path: &Path) -> Result<Self, ImageLoadError> {
        let image = image::open(path).map_err(|source| match source {
            image::ImageError::IoError(ref err) if err.kind() == std::io::ErrorKind::NotFound => {
                ImageLoadError::NotFound {
                    path: path.to_path_buf(),
                }
            }
            source => ImageLoadError::Unreadable {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_image(&image).ok_or_else(|| ImageLoadError::Empty {
            path: path.to_path_buf(),
        })
    }

    /// Copies `image` dropping any transparency. `None` for zero-sized images.
    pub fn from_image(image: &DynamicImage) -> Option<Self> {
        let rgb = image.to_rgb8();
        let size = IntSize::from_wh(rgb.width(), rgb.height())?;
        let mut data = Vec::with_capacity(rgb.width() as usize * rgb.height() as usize * 4);
        for pixel in rgb.pixels() {
            data.extend_from_slice(&[pixel[0], pixel[1], pixel[2], u8::MAX]);
        }
        // fully opaque, so straight and premultiplied alpha coincide
        let pixmap = Pixmap::from_vec(data, size)?;
        Some(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        // tiny-skia only checks the flat index, so a wide x would wrap rows
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba([color.red(), color.green(), color.blue(), color.alpha()]))
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width(), self.height());
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            if let Some(value) = self.pixel(x, y) {
                *pixel = value;
            }
        }
        image
    }

    /// Writes the canvas as RGB; the format follows the path extension.
    pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
        DynamicImage::ImageRgba8(self.to_rgba_image())
            .to_rgb8()
            .save(path)
    }
}

fn solid_paint(color: Rgba<u8>, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], color[3]);
    paint.anti_alias = anti_alias;
    paint
}

impl Surface for Canvas {
    fn erase(&mut self, region: &TextBox, fill: Rgba<u8>) {
        let Some(rect) = Rect::from_xywh(
            region.left as f32,
            region.top as f32,
            region.width as f32 + 1.0,
            region.height as f32 + 1.0,
        ) else {
            return;
        };
        self.pixmap
            .fill_rect(rect, &solid_paint(fill, false), Transform::identity(), None);
    }

    fn draw_text(&mut self, text: &str, at: RenderPlacement, font: &FontResource, color: Rgba<u8>) {
        let Some(run) = font.glyph_run(text, at) else {
            return;
        };
        let paint = solid_paint(color, true);
        match run.paint {
            GlyphPaint::Fill => {
                self.pixmap.fill_path(
                    &run.path,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            GlyphPaint::Stroke(width) => {
                let stroke = Stroke {
                    width,
                    ..Stroke::default()
                };
                self.pixmap
                    .stroke_path(&run.path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }
}
