//! Image resize-to-fit
//!
//! Scales a source illustration uniformly into a bounding box and writes the
//! result to a temporary PNG that is removed when its guard drops.

use bubblebook_core::{BookError, Result};
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

/// A resized copy on disk. The file is deleted on drop.
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl TempImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decode back as 8-bit RGB for embedding
    pub fn load_rgb(&self) -> Result<image::RgbImage> {
        let img = image::open(&self.path).map_err(|e| {
            BookError::ImageError(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        Ok(img.to_rgb8())
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), "temp image already gone: {}", e);
        }
    }
}

/// Uniform scale factor that fits (width, height) inside (max_width, max_height)
pub fn fit_scale(width: u32, height: u32, max_width: u32, max_height: u32) -> f64 {
    let width_ratio = f64::from(max_width) / f64::from(width);
    let height_ratio = f64::from(max_height) / f64::from(height);
    width_ratio.min(height_ratio)
}

/// Target size after scaling, truncated so it never exceeds the bounds
pub fn fitted_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let scale = fit_scale(width, height, max_width, max_height);
    let w = ((f64::from(width) * scale) as u32).clamp(1, max_width.max(1));
    let h = ((f64::from(height) * scale) as u32).clamp(1, max_height.max(1));
    (w, h)
}

/// Resize `image_path` to fit the bounds (in pixels).
///
/// Returns `None` with a warning when the file is missing or cannot be
/// decoded or written.
pub fn resize_to_fit(image_path: &Path, max_width: u32, max_height: u32) -> Option<TempImage> {
    if !image_path.exists() {
        tracing::warn!(path = %image_path.display(), "image file does not exist");
        return None;
    }

    match try_resize(image_path, max_width, max_height) {
        Ok(temp) => Some(temp),
        Err(e) => {
            tracing::warn!(path = %image_path.display(), "cannot process image: {}", e);
            None
        }
    }
}

fn try_resize(image_path: &Path, max_width: u32, max_height: u32) -> Result<TempImage> {
    if max_width == 0 || max_height == 0 {
        return Err(BookError::ValidationError(format!(
            "bounding box {}x{} is empty",
            max_width, max_height
        )));
    }

    let img = image::open(image_path)
        .map_err(|e| BookError::ImageError(format!("decode failed: {}", e)))?;
    let (width, height) = fitted_size(img.width(), img.height(), max_width, max_height);
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);

    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let path = std::env::temp_dir().join(format!("bubblebook_{}_{}.png", stem, uuid::Uuid::new_v4()));

    // Guard first so the file goes away even if the write fails halfway
    let temp = TempImage {
        path,
        width,
        height,
    };
    resized
        .save_with_format(&temp.path, image::ImageFormat::Png)
        .map_err(|e| BookError::ImageError(format!("write failed: {}", e)))?;
    Ok(temp)
}
