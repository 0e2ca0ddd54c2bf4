//! Draws detected regions onto a copy of the uploaded image

use crate::engine::TextRegion;
use crate::error::OcrError;
use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::{Path, PathBuf};

const OUTLINE: Rgba<u8> = Rgba([0, 255, 0, 255]);
const LABEL_TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Outline thickness in pixels (odd, centered on the polygon edge)
const OUTLINE_WIDTH: i32 = 3;
/// Distance of the top of the label above the region's first corner
const LABEL_OFFSET: f32 = 15.0;
const LABEL_HEIGHT: u32 = 14;
/// Label bar width per character of region text
const LABEL_CHAR_WIDTH: u32 = 10;

/// Fonts tried when none is configured
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Annotated image and anything that went wrong while drawing
pub struct Annotated {
    pub image: DynamicImage,
    pub warnings: Vec<String>,
}

pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Use the configured font, else the first system font that loads
    ///
    /// Never fails: without a font the annotator still draws outlines.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match load_font(path) {
                Ok(font) => {
                    tracing::info!("Using label font {:?}", path);
                    return Self::new(Some(font));
                }
                Err(e) => tracing::warn!("{}; labels will be omitted", e),
            }
            return Self::new(None);
        }

        let discovered = FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .find_map(|p| load_font(&p).ok().map(|font| (p, font)));

        match discovered {
            Some((path, font)) => {
                tracing::info!("Using label font {:?}", path);
                Self::new(Some(font))
            }
            None => {
                tracing::warn!("No label font found; set --font-path to label annotated regions");
                Self::new(None)
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Outline every region and label it with `text (confidence)`
    pub fn render(&self, source: &DynamicImage, regions: &[TextRegion]) -> Annotated {
        let mut canvas: RgbaImage = source.to_rgba8();
        let mut warnings = Vec::new();

        if self.font.is_none() && !regions.is_empty() {
            warnings.push(
                "No font available for labels; only region outlines were drawn".to_string(),
            );
        }

        for region in regions {
            draw_outline(&mut canvas, region);
            self.draw_label(&mut canvas, region);
        }

        Annotated {
            image: DynamicImage::ImageRgba8(canvas),
            warnings,
        }
    }

    fn draw_label(&self, canvas: &mut RgbaImage, region: &TextRegion) {
        let label = format!("{} ({:.2})", region.text, region.confidence);
        let scale = PxScale::from(LABEL_HEIGHT as f32);

        let [x, y] = region.polygon[0];
        let text_x = x.round() as i32;
        let text_y = ((y - LABEL_OFFSET).round() as i32).max(0);

        let background = Rect::at(text_x - 2, text_y - 2)
            .of_size(label_bar_width(&region.text) + 4, LABEL_HEIGHT + 4);
        draw_filled_rect_mut(canvas, background, OUTLINE);

        if let Some(font) = &self.font {
            draw_text_mut(canvas, LABEL_TEXT, text_x, text_y, scale, font, &label);
        }
    }
}

fn label_bar_width(text: &str) -> u32 {
    (text.chars().count() as u32 * LABEL_CHAR_WIDTH).max(1)
}

/// Polygon outline widened by redrawing it at small offsets
fn draw_outline(canvas: &mut RgbaImage, region: &TextRegion) {
    // imageproc rejects polygons whose first and last points coincide
    if region.polygon[0] == region.polygon[3] {
        return;
    }

    let half = OUTLINE_WIDTH / 2;
    for dx in -half..=half {
        for dy in -half..=half {
            let points: Vec<Point<f32>> = region
                .polygon
                .iter()
                .map(|[x, y]| Point::new(x + dx as f32, y + dy as f32))
                .collect();
            draw_hollow_polygon_mut(canvas, &points, OUTLINE);
        }
    }
}

pub fn load_font(path: &Path) -> Result<FontArc, OcrError> {
    let bytes = std::fs::read(path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to read font {:?}: {}", path, e))
    })?;
    FontArc::try_from_vec(bytes).map_err(|e| {
        OcrError::InitializationError(format!("Invalid font file {:?}: {}", path, e))
    })
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| OcrError::Internal(format!("Failed to encode PNG: {}", e)))?;
    Ok(buffer)
}
