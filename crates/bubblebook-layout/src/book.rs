//! Book layout assembler
//!
//! Verifies every page image up front, then renders one PDF page per record
//! and writes the finished document.

use crate::pages::{BookFile, PageKind, PageRecord};
use crate::render::{cm, pdf_error, Fonts, PageRenderer, PAGE_SIZE_CM};
use bubblebook_core::{BookError, Result};
use printpdf::PdfDocument;
use std::path::{Path, PathBuf};

/// Resolution illustrations are resampled to before embedding
pub const DEFAULT_IMAGE_DPI: f32 = 150.0;

const LAYER_NAME: &str = "Layer 1";

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub output: PathBuf,
    pub pages: usize,
    pub images_placed: usize,
    pub size_bytes: usize,
}

/// A book ready to be laid out
pub struct BookLayout {
    title: String,
    pages: Vec<PageRecord>,
    images_dir: PathBuf,
    font: Option<PathBuf>,
    image_dpi: f32,
}

impl BookLayout {
    pub fn new(book: BookFile, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            title: book.document_title(),
            pages: book.pages,
            images_dir: images_dir.into(),
            font: None,
            image_dpi: DEFAULT_IMAGE_DPI,
        }
    }

    /// The bundled story with images looked up in `images_dir`
    pub fn builtin(images_dir: impl Into<PathBuf>) -> Self {
        Self::new(BookFile::builtin(), images_dir)
    }

    /// Use a TrueType font file instead of builtin Helvetica
    pub fn with_font(mut self, font: impl Into<PathBuf>) -> Self {
        self.font = Some(font.into());
        self
    }

    pub fn with_image_dpi(mut self, dpi: f32) -> Self {
        self.image_dpi = dpi;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Image names (as written in the page records) that do not exist on disk
    pub fn missing_images(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter(|page| !page.image_path(&self.images_dir).is_file())
            .map(|page| page.image.clone())
            .collect()
    }

    /// Lay out every page and write the PDF to `output`.
    ///
    /// Fails with `MissingImages` before anything is rendered when any page
    /// image is absent; no output file is created in that case.
    pub fn build(&self, output: &Path) -> Result<BuildReport> {
        if self.pages.is_empty() {
            return Err(BookError::ValidationError("book has no pages".to_string()));
        }
        let missing = self.missing_images();
        if !missing.is_empty() {
            return Err(BookError::MissingImages(missing));
        }
        if self.image_dpi.is_nan() || self.image_dpi <= 0.0 {
            return Err(BookError::ValidationError(format!(
                "image dpi must be positive, got {}",
                self.image_dpi
            )));
        }

        tracing::info!(pages = self.pages.len(), title = %self.title, "laying out book");

        let page_size = cm(PAGE_SIZE_CM);
        let (doc, first_page, first_layer) = PdfDocument::new(&self.title, page_size, page_size, LAYER_NAME);

        let fonts = match self.font {
            Some(ref path) => Fonts::from_file(&doc, path)?,
            None => Fonts::builtin(&doc)?,
        };
        if !fonts.is_unicode() && self.has_non_latin_text() {
            tracing::warn!("builtin Helvetica cannot draw CJK text; pass a font file to render it");
        }
        let renderer = PageRenderer::new(&fonts, self.image_dpi);

        let mut images_placed = 0;
        for (i, record) in self.pages.iter().enumerate() {
            let (page, layer) = if i == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(page_size, page_size, LAYER_NAME)
            };
            let layer = doc.get_page(page).get_layer(layer);

            tracing::debug!(page = i + 1, image = %record.image, "rendering");
            if renderer.render_page(&layer, record, &self.images_dir)? {
                images_placed += 1;
            } else {
                tracing::warn!(image = %record.image, "page rendered without its illustration");
            }
        }

        let bytes = doc.save_to_bytes().map_err(pdf_error)?;
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(output, &bytes)?;

        tracing::info!(output = %output.display(), "book written");
        Ok(BuildReport {
            output: output.to_path_buf(),
            pages: self.pages.len(),
            images_placed,
            size_bytes: bytes.len(),
        })
    }

    fn has_non_latin_text(&self) -> bool {
        self.pages.iter().any(|page| {
            let cover_text = match page.kind {
                PageKind::Cover {
                    ref title,
                    ref subtitle,
                    ref author,
                    ref year,
                } => [title, subtitle, author, year].iter().any(|s| !s.is_ascii()),
                PageKind::Content => false,
            };
            cover_text || page.texts.iter().any(|t| !t.content.is_ascii())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::TextKind;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bubblebook_book_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path) {
        image::RgbImage::from_pixel(48, 32, image::Rgb([227, 242, 253]))
            .save(path)
            .unwrap();
    }

    fn small_book() -> BookFile {
        BookFile {
            title: None,
            pages: vec![
                PageRecord::cover("Cover.png", "The Bubble", "A first book", "by Someone", "2025"),
                PageRecord::content(
                    "Page1.png",
                    &[
                        (TextKind::Sound, "Pop pop pop..."),
                        (TextKind::Normal, "A bubble floats out"),
                        (TextKind::Speech, "I am a bubble"),
                    ],
                ),
            ],
        }
    }

    #[test]
    fn test_missing_image_fails_without_output() {
        let dir = temp_dir();
        write_png(&dir.join("Cover.png"));
        let output = dir.join("book.pdf");

        let layout = BookLayout::new(small_book(), &dir);
        match layout.build(&output) {
            Err(BookError::MissingImages(missing)) => assert_eq!(missing, vec!["Page1.png".to_string()]),
            other => panic!("expected MissingImages, got {:?}", other.map(|r| r.pages)),
        }
        assert!(!output.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builtin_lists_all_missing() {
        let dir = temp_dir();
        let layout = BookLayout::builtin(&dir);
        let missing = layout.missing_images();
        assert_eq!(missing.len(), 10);
        assert_eq!(missing[0], "Cover.png");
        assert_eq!(layout.title(), "泡泡知道自己在哪裡");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_build_writes_pdf() {
        let dir = temp_dir();
        write_png(&dir.join("Cover.png"));
        write_png(&dir.join("Page1.png"));
        let output = dir.join("out").join("book.pdf");

        let layout = BookLayout::new(small_book(), &dir).with_image_dpi(72.0);
        let report = layout.build(&output).unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.images_placed, 2);
        let bytes = std::fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(bytes.len(), report.size_bytes);

        // Resized copies are cleaned up after drawing
        let leftovers = std::fs::read_dir(std::env::temp_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.starts_with("bubblebook_Page1_")
            })
            .count();
        assert_eq!(leftovers, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_font_is_error() {
        let dir = temp_dir();
        write_png(&dir.join("Cover.png"));
        write_png(&dir.join("Page1.png"));
        let output = dir.join("book.pdf");

        let layout = BookLayout::new(small_book(), &dir).with_font(dir.join("NoSuchFont.ttf"));
        assert!(matches!(layout.build(&output), Err(BookError::PdfError(_))));
        assert!(!output.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
