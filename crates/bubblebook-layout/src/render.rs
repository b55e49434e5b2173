//! Page rendering
//!
//! Draws the two page templates onto a printpdf layer. All coordinates are
//! measured in centimetres from the bottom-left corner of a 20 cm square page.

use crate::pages::{PageKind, PageRecord, TextItem, TextKind};
use crate::resize::resize_to_fit;
use bubblebook_core::{BookError, Result};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject,
    IndirectFontRef, Mm, PdfDocumentReference, PdfLayerReference, Px, Rect, Rgb,
};
use std::path::Path;

pub const PAGE_SIZE_CM: f32 = 20.0;

const MM_PER_PT: f32 = 25.4 / 72.0;

/// Page palette
pub const BUBBLE_BLUE: u32 = 0x1976D2;
pub const BUBBLE_BG: u32 = 0xE3F2FD;
pub const SOUND_ORANGE: u32 = 0xFF9800;
pub const WHITE: u32 = 0xFFFFFF;

const COVER_IMAGE_BOX: ImageBox = ImageBox { x: 4.0, y: 10.0, size: 12.0 };
const CONTENT_IMAGE_BOX: ImageBox = ImageBox { x: 3.0, y: 7.5, size: 14.0 };

const TITLE_STYLE: TextStyle = TextStyle { size_pt: 48.0, color: BUBBLE_BLUE, bold: true };
const SUBTITLE_STYLE: TextStyle = TextStyle { size_pt: 24.0, color: BUBBLE_BLUE, bold: false };
const AUTHOR_STYLE: TextStyle = TextStyle { size_pt: 18.0, color: BUBBLE_BLUE, bold: false };

/// First text line of a content page
const CONTENT_TEXT_TOP_CM: f32 = 5.0;
const SPEECH_PADDING_PT: f32 = 6.0;
const SPEECH_BORDER_PT: f32 = 2.0;

/// Square area an illustration is fitted into
#[derive(Debug, Clone, Copy)]
struct ImageBox {
    x: f32,
    y: f32,
    size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f32,
    pub color: u32,
    pub bold: bool,
}

impl TextKind {
    /// Font style for this kind of line
    pub fn style(self) -> TextStyle {
        match self {
            TextKind::Sound => TextStyle { size_pt: 32.0, color: SOUND_ORANGE, bold: true },
            TextKind::Speech => TextStyle { size_pt: 22.0, color: BUBBLE_BLUE, bold: true },
            TextKind::Normal => TextStyle { size_pt: 24.0, color: BUBBLE_BLUE, bold: false },
        }
    }

    /// Distance to the next line, in centimetres
    pub fn line_step_cm(self) -> f32 {
        match self {
            TextKind::Sound => 0.8,
            TextKind::Speech => 1.0,
            TextKind::Normal => 0.6,
        }
    }
}

/// Baseline heights (cm) for each text item of a content page
pub fn text_baselines(items: &[TextItem]) -> Vec<f32> {
    let mut y = CONTENT_TEXT_TOP_CM;
    items
        .iter()
        .map(|item| {
            let at = y;
            y -= item.kind.line_step_cm();
            at
        })
        .collect()
}

pub fn cm(value: f32) -> Mm {
    Mm(value * 10.0)
}

fn rgb(hex: u32) -> Color {
    let channel = |shift: u32| ((hex >> shift) & 0xFF) as f32 / 255.0;
    Color::Rgb(Rgb::new(channel(16), channel(8), channel(0), None))
}

/// Pixel edge of a square box at the given resolution
pub fn box_pixels(size_cm: f32, dpi: f32) -> u32 {
    ((size_cm / 2.54) * dpi).round().max(1.0) as u32
}

/// Approximate advance width of `text` in millimetres.
///
/// CJK glyphs are a full em wide; Latin text averages a little over half.
pub fn estimate_text_width_mm(text: &str, size_pt: f32) -> f32 {
    let ems: f32 = text
        .chars()
        .map(|c| if c.is_ascii() { 0.55 } else { 1.0 })
        .sum();
    ems * size_pt * MM_PER_PT
}

/// Fonts used for every page of one document
pub struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    unicode: bool,
}

impl Fonts {
    /// Builtin Helvetica, which only covers Latin text
    pub fn builtin(doc: &PdfDocumentReference) -> Result<Self> {
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;
        Ok(Self { regular, bold, unicode: false })
    }

    /// A TrueType/OpenType font file, used for regular and bold text alike
    pub fn from_file(doc: &PdfDocumentReference, path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            BookError::PdfError(format!("cannot open font {}: {}", path.display(), e))
        })?;
        let font = doc.add_external_font(file).map_err(pdf_error)?;
        Ok(Self {
            regular: font.clone(),
            bold: font,
            unicode: true,
        })
    }

    /// Whether non-Latin text will render
    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    fn for_style(&self, style: &TextStyle) -> &IndirectFontRef {
        if style.bold {
            &self.bold
        } else {
            &self.regular
        }
    }
}

pub(crate) fn pdf_error(e: printpdf::Error) -> BookError {
    BookError::PdfError(e.to_string())
}

/// Draws page templates with a fixed font set and image resolution
pub struct PageRenderer<'a> {
    fonts: &'a Fonts,
    image_dpi: f32,
}

impl<'a> PageRenderer<'a> {
    pub fn new(fonts: &'a Fonts, image_dpi: f32) -> Self {
        Self { fonts, image_dpi }
    }

    /// Render one record; returns whether its illustration was placed
    pub fn render_page(&self, layer: &PdfLayerReference, record: &PageRecord, images_dir: &Path) -> Result<bool> {
        let image = record.image_path(images_dir);
        match record.kind {
            PageKind::Cover {
                ref title,
                ref subtitle,
                ref author,
                ref year,
            } => self.render_cover(layer, &image, [title, subtitle, author, year].map(String::as_str)),
            PageKind::Content => self.render_content(layer, &image, &record.texts),
        }
    }

    /// Light-blue page with the cover art, then title, subtitle, author and year
    pub fn render_cover(&self, layer: &PdfLayerReference, image: &Path, lines: [&str; 4]) -> Result<bool> {
        fill_page(layer, BUBBLE_BG);
        let placed = self.place_image(layer, image, COVER_IMAGE_BOX)?;

        let [title, subtitle, author, year] = lines;
        self.centered_text(layer, title, &TITLE_STYLE, 8.0);
        self.centered_text(layer, subtitle, &SUBTITLE_STYLE, 7.0);
        self.centered_text(layer, author, &AUTHOR_STYLE, 5.5);
        self.centered_text(layer, year, &AUTHOR_STYLE, 5.0);
        Ok(placed)
    }

    /// White page with the illustration and the story lines beneath it
    pub fn render_content(&self, layer: &PdfLayerReference, image: &Path, texts: &[TextItem]) -> Result<bool> {
        fill_page(layer, WHITE);
        let placed = self.place_image(layer, image, CONTENT_IMAGE_BOX)?;

        for (item, y) in texts.iter().zip(text_baselines(texts)) {
            let style = item.kind.style();
            let text = item.display_text();
            if item.kind == TextKind::Speech {
                speech_box(layer, &text, &style, y);
            }
            self.centered_text(layer, &text, &style, y);
        }
        Ok(placed)
    }

    fn centered_text(&self, layer: &PdfLayerReference, text: &str, style: &TextStyle, y_cm: f32) {
        let width = estimate_text_width_mm(text, style.size_pt);
        let x = ((PAGE_SIZE_CM * 10.0 - width) / 2.0).max(0.0);
        layer.set_fill_color(rgb(style.color));
        layer.use_text(text, style.size_pt, Mm(x), cm(y_cm), self.fonts.for_style(style));
    }

    /// Fit the image into the box, centred, keeping its aspect ratio
    fn place_image(&self, layer: &PdfLayerReference, path: &Path, area: ImageBox) -> Result<bool> {
        let max_px = box_pixels(area.size, self.image_dpi);
        let Some(temp) = resize_to_fit(path, max_px, max_px) else {
            return Ok(false);
        };
        let rgb_image = temp.load_rgb()?;
        let (width, height) = rgb_image.dimensions();

        let px_to_mm = |px: u32| px as f32 / self.image_dpi * 25.4;
        let box_mm = area.size * 10.0;
        let x = area.x * 10.0 + (box_mm - px_to_mm(width)) / 2.0;
        let y = area.y * 10.0 + (box_mm - px_to_mm(height)) / 2.0;

        let xobject = ImageXObject {
            width: Px(width as usize),
            height: Px(height as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: rgb_image.into_raw(),
            image_filter: None,
            smask: None,
            clipping_bbox: None,
        };
        Image::from(xobject).add_to_layer(
            layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(y)),
                dpi: Some(self.image_dpi),
                ..Default::default()
            },
        );
        Ok(true)
    }
}

fn fill_page(layer: &PdfLayerReference, color: u32) {
    layer.set_fill_color(rgb(color));
    layer.add_rect(Rect::new(Mm(0.0), Mm(0.0), cm(PAGE_SIZE_CM), cm(PAGE_SIZE_CM)).with_mode(PaintMode::Fill));
}

/// Light-blue box with a blue border behind a speech line
fn speech_box(layer: &PdfLayerReference, text: &str, style: &TextStyle, baseline_cm: f32) {
    let pad = SPEECH_PADDING_PT * MM_PER_PT;
    let size = style.size_pt * MM_PER_PT;
    let width = estimate_text_width_mm(text, style.size_pt);
    let left = (PAGE_SIZE_CM * 10.0 - width) / 2.0 - pad;
    let right = (PAGE_SIZE_CM * 10.0 + width) / 2.0 + pad;
    let baseline = baseline_cm * 10.0;

    layer.set_fill_color(rgb(BUBBLE_BG));
    layer.set_outline_color(rgb(BUBBLE_BLUE));
    layer.set_outline_thickness(SPEECH_BORDER_PT);
    layer.add_rect(
        Rect::new(
            Mm(left.max(0.0)),
            Mm(baseline - 0.25 * size - pad / 2.0),
            Mm(right.min(PAGE_SIZE_CM * 10.0)),
            Mm(baseline + 0.85 * size),
        )
        .with_mode(PaintMode::FillStroke),
    );
}
