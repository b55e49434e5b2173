//! Mock backend for offline runs and tests
//!
//! Produces a solid-colour PNG whose colour is derived from the prompt, so
//! different pages are visually distinguishable without any model.

use crate::backend::*;
use bubblebook_core::{BookError, Result};
use std::io::Cursor;

/// A backend that paints placeholder images locally
#[derive(Default)]
pub struct MockBackend {
    loaded: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn health_check(&self) -> Result<BackendStatus> {
        Ok(BackendStatus::Available)
    }

    fn load_model(&mut self, model: &str) -> Result<ModelSession> {
        if model.trim().is_empty() {
            return Err(BookError::BackendError("model identifier is empty".to_string()));
        }
        self.loaded = Some(model.to_string());
        Ok(ModelSession {
            model: model.to_string(),
            device: Device::Cpu,
            sampler: MULTISTEP_SAMPLER.to_string(),
            low_memory: false,
        })
    }

    fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Vec<u8>> {
        if self.loaded.is_none() {
            return Err(BookError::ModelNotLoaded);
        }
        solid_png(&request.prompt, request.width, request.height)
    }
}

/// Encode a single-colour PNG tinted by the hash of `seed_text`
pub fn solid_png(seed_text: &str, width: u32, height: u32) -> Result<Vec<u8>> {
    let hash_val = seed_text
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let colour = image::Rgb([
        ((hash_val >> 16) & 0xFF) as u8,
        ((hash_val >> 8) & 0xFF) as u8,
        (hash_val & 0xFF) as u8,
    ]);

    let img = image::RgbImage::from_pixel(width, height, colour);
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| BookError::ImageError(format!("Failed to encode PNG: {}", e)))?;
    Ok(bytes)
}
