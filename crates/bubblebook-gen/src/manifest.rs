//! Generation manifest
//!
//! Records every image the driver produced with its provenance (backend,
//! model, prompt, seed, time) so a chosen variation can be reproduced.

use bubblebook_core::{BookError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "manifest.toml";

/// One successfully generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImageRef {
    pub page_id: String,
    /// 1-based
    pub variation_index: u32,
    pub file_path: String,
}

/// A record of a single generated image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub page_id: String,
    pub variation_index: u32,
    pub file_path: String,
    pub backend: String,
    pub model: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub steps: u32,
    pub guidance_scale: f32,
    pub content_hash: String,
    pub generated_at: String,
    pub duration_secs: f64,
}

impl ManifestEntry {
    pub fn image_ref(&self) -> GeneratedImageRef {
        GeneratedImageRef {
            page_id: self.page_id.clone(),
            variation_index: self.variation_index,
            file_path: self.file_path.clone(),
        }
    }
}

/// Manifest of all images in a generated directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub created_at: String,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    manifest: GenerationManifest,
}

impl GenerationManifest {
    pub fn new() -> Self {
        Self {
            created_at: now_rfc3339(),
            entries: Vec::new(),
        }
    }

    /// Add an entry, replacing an older record of the same file
    pub fn add_entry(&mut self, entry: ManifestEntry) {
        self.entries.retain(|e| e.file_path != entry.file_path);
        self.entries.push(entry);
    }

    pub fn entries_for<'a>(&'a self, page_id: &'a str) -> impl Iterator<Item = &'a ManifestEntry> {
        self.entries.iter().filter(move |e| e.page_id == page_id)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ManifestFile = toml::from_str(&content).map_err(|e| {
            BookError::ConfigError(format!("Failed to parse manifest {}: {}", path.display(), e))
        })?;
        Ok(file.manifest)
    }

    /// Load an existing manifest, or start a new one when there is none
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ManifestFile {
            manifest: self.clone(),
        };
        std::fs::write(path, toml::to_string_pretty(&file)?)?;
        Ok(())
    }
}

impl Default for GenerationManifest {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
