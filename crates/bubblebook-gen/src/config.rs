//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `BUBBLEBOOK_BACKEND`, `BUBBLEBOOK_MODEL`, `BUBBLEBOOK_WEBUI_URL`
//! 2. Project-local: `.bubblebook/config.toml`
//! 3. Global: `~/.bubblebook/config.toml`

use bubblebook_core::{BookError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::DEFAULT_CHECKPOINT;

pub const DEFAULT_BACKEND: &str = "webui";
pub const DEFAULT_WEBUI_URL: &str = "http://127.0.0.1:7860";
pub const DEFAULT_PAUSE_MS: u64 = 1000;
pub const DEFAULT_VARIATIONS: u32 = 3;

/// `[backend]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// `[backends.webui]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebUiSection {
    #[serde(default)]
    pub url: Option<String>,
}

/// `[backends.script]` table: an external txt2img program run once per image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSection {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    /// The program runs on a GPU
    #[serde(default)]
    pub accelerated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsSection {
    #[serde(default)]
    pub webui: WebUiSection,
    #[serde(default)]
    pub script: ScriptSection,
}

/// `[generation]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Root of the `illustrations/` tree
    #[serde(default)]
    pub base_dir: Option<String>,
    #[serde(default)]
    pub pause_ms: Option<u64>,
    #[serde(default)]
    pub num_variations: Option<u32>,
}

/// `[book]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSection {
    #[serde(default)]
    pub images_dir: Option<String>,
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub font: Option<String>,
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfigFile {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub backends: BackendsSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub book: BookSection,
}

/// Resolved configuration, constructed once in `main` and passed down
#[derive(Debug, Clone, Default)]
pub struct ToolConfig {
    file: ToolConfigFile,
}

impl ToolConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = ToolConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".bubblebook/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config);
        Ok(ToolConfig { file: config })
    }

    /// Load config from a specific file path only (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(ToolConfig { file: config })
    }

    pub fn from_file_struct(file: ToolConfigFile) -> Self {
        Self { file }
    }

    pub fn backend_name(&self) -> &str {
        self.file.backend.name.as_deref().unwrap_or(DEFAULT_BACKEND)
    }

    pub fn model(&self) -> &str {
        self.file.backend.model.as_deref().unwrap_or(DEFAULT_CHECKPOINT)
    }

    pub fn webui_url(&self) -> &str {
        self.file.backends.webui.url.as_deref().unwrap_or(DEFAULT_WEBUI_URL)
    }

    pub fn script(&self) -> &ScriptSection {
        &self.file.backends.script
    }

    pub fn base_dir(&self) -> &str {
        self.file.generation.base_dir.as_deref().unwrap_or("illustrations")
    }

    pub fn pause_ms(&self) -> u64 {
        self.file.generation.pause_ms.unwrap_or(DEFAULT_PAUSE_MS)
    }

    pub fn num_variations(&self) -> u32 {
        self.file.generation.num_variations.unwrap_or(DEFAULT_VARIATIONS)
    }

    pub fn book(&self) -> &BookSection {
        &self.file.book
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".bubblebook").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<ToolConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            BookError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut ToolConfigFile, overlay: ToolConfigFile) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut base.backend.name, overlay.backend.name);
        take(&mut base.backend.model, overlay.backend.model);
        take(&mut base.backends.webui.url, overlay.backends.webui.url);

        let script = overlay.backends.script;
        if script.program.is_some() {
            base.backends.script = script;
        }

        take(&mut base.generation.base_dir, overlay.generation.base_dir);
        take(&mut base.generation.pause_ms, overlay.generation.pause_ms);
        take(&mut base.generation.num_variations, overlay.generation.num_variations);

        take(&mut base.book.images_dir, overlay.book.images_dir);
        take(&mut base.book.pages, overlay.book.pages);
        take(&mut base.book.output, overlay.book.output);
        take(&mut base.book.font, overlay.book.font);
    }

    fn apply_env_overrides(config: &mut ToolConfigFile) {
        if let Ok(name) = std::env::var("BUBBLEBOOK_BACKEND") {
            config.backend.name = Some(name);
        }
        if let Ok(model) = std::env::var("BUBBLEBOOK_MODEL") {
            config.backend.model = Some(model);
        }
        if let Ok(url) = std::env::var("BUBBLEBOOK_WEBUI_URL") {
            config.backends.webui.url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bubblebook_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_file() {
        let config_str = r#"
[backends.script]
program = "python"
args = ["scripts/txt2img.py"]
workdir = "/opt/stable-diffusion"
accelerated = true

[generation]
base_dir = "out/illustrations"
pause_ms = 0
num_variations = 2

[book]
font = "fonts/NotoSansTC-Regular.ttf"
"#;
        let path = temp_config(config_str);
        let config = ToolConfig::load_from_file(&path).unwrap();

        assert_eq!(config.script().program.as_deref(), Some("python"));
        assert_eq!(config.script().args, vec!["scripts/txt2img.py".to_string()]);
        assert!(config.script().accelerated);
        assert_eq!(config.base_dir(), "out/illustrations");
        assert_eq!(config.pause_ms(), 0);
        assert_eq!(config.num_variations(), 2);
        assert_eq!(config.book().font.as_deref(), Some("fonts/NotoSansTC-Regular.ttf"));

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_var_override() {
        let path = temp_config("[backends.webui]\nurl = \"http://file:7860\"\n");

        std::env::set_var("BUBBLEBOOK_WEBUI_URL", "http://env:7860");
        let config = ToolConfig::load_from_file(&path).unwrap();
        std::env::remove_var("BUBBLEBOOK_WEBUI_URL");

        assert_eq!(config.webui_url(), "http://env:7860");
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_defaults() {
        let config = ToolConfig::default();
        assert_eq!(config.webui_url(), DEFAULT_WEBUI_URL);
        assert_eq!(config.base_dir(), "illustrations");
        assert_eq!(config.pause_ms(), DEFAULT_PAUSE_MS);
        assert_eq!(config.num_variations(), 3);
        assert!(config.book().output.is_none());
    }

    #[test]
    fn test_merge_overlay_wins_only_when_set() {
        let mut base = ToolConfigFile::default();
        base.backend.model = Some("deliberate_v2.safetensors".to_string());
        base.generation.pause_ms = Some(500);

        let mut overlay = ToolConfigFile::default();
        overlay.generation.pause_ms = Some(0);

        ToolConfig::merge_into(&mut base, overlay);
        assert_eq!(base.backend.model.as_deref(), Some("deliberate_v2.safetensors"));
        assert_eq!(base.generation.pause_ms, Some(0));
    }

    #[test]
    fn test_invalid_config_is_error() {
        let path = temp_config("[generation\npause_ms = ");
        assert!(matches!(
            ToolConfig::load_from_file(&path),
            Err(BookError::ConfigError(_))
        ));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
