//! PDF book layout command

use anyhow::Result;
use bubblebook_core::BookError;
use bubblebook_gen::ToolConfig;
use bubblebook_layout::{BookFile, BookLayout, DEFAULT_OUTPUT};
use std::path::Path;

pub struct BookArgs {
    pub images: Option<String>,
    pub book: Option<String>,
    pub output: Option<String>,
    pub font: Option<String>,
    pub dpi: Option<f32>,
}

pub fn run(args: BookArgs, config: &ToolConfig) -> Result<()> {
    let defaults = config.book();
    let images_dir = args
        .images
        .or_else(|| defaults.images_dir.clone())
        .unwrap_or_else(|| ".".to_string());
    let output = args
        .output
        .or_else(|| defaults.output.clone())
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let book = match args.book.or_else(|| defaults.pages.clone()) {
        Some(path) => BookFile::load(Path::new(&path))?,
        None => BookFile::builtin(),
    };

    let mut layout = BookLayout::new(book, &images_dir);
    if let Some(font) = args.font.or_else(|| defaults.font.clone()) {
        layout = layout.with_font(font);
    }
    if let Some(dpi) = args.dpi {
        layout = layout.with_image_dpi(dpi);
    }

    println!("Laying out '{}' ({} pages)", layout.title(), layout.pages().len());

    match layout.build(Path::new(&output)) {
        Ok(report) => {
            println!("  Images placed: {}/{}", report.images_placed, report.pages);
            println!("  Size: {} KB", report.size_bytes / 1024);
            println!("PDF written: {}", report.output.display());
            Ok(())
        }
        Err(BookError::MissingImages(missing)) => {
            eprintln!("Missing image files in {}:", images_dir);
            for name in &missing {
                eprintln!("  {}", name);
            }
            anyhow::bail!("{} image file(s) missing; no PDF written", missing.len())
        }
        Err(e) => Err(e.into()),
    }
}
