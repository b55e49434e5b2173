//! Illustration directory layout
//!
//! ```text
//! illustrations/
//!   cover/  pages/  raw/  processed/  generated/
//!   generation_config.json
//! ```

use bubblebook_core::Result;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "generation_config.json";

/// Paths of the fixed `illustrations/` tree
#[derive(Debug, Clone)]
pub struct IllustrationDirs {
    base: PathBuf,
}

impl IllustrationDirs {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn cover(&self) -> PathBuf {
        self.base.join("cover")
    }

    pub fn pages(&self) -> PathBuf {
        self.base.join("pages")
    }

    /// Output of externally run batch scripts
    pub fn raw(&self) -> PathBuf {
        self.base.join("raw")
    }

    pub fn processed(&self) -> PathBuf {
        self.base.join("processed")
    }

    /// Output of the generation driver
    pub fn generated(&self) -> PathBuf {
        self.base.join("generated")
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join(CONFIG_FILE_NAME)
    }

    /// Create every directory of the tree, returning the ones ensured
    pub fn create_all(&self) -> Result<Vec<PathBuf>> {
        let dirs = vec![
            self.cover(),
            self.pages(),
            self.raw(),
            self.processed(),
            self.generated(),
        ];
        for dir in &dirs {
            std::fs::create_dir_all(dir)?;
            tracing::debug!(dir = %dir.display(), "ensured directory");
        }
        Ok(dirs)
    }
}

impl Default for IllustrationDirs {
    fn default() -> Self {
        Self::new("illustrations")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_all() {
        let base = std::env::temp_dir()
            .join(format!("bubblebook_dirs_test_{}", uuid::Uuid::new_v4()))
            .join("illustrations");
        let dirs = IllustrationDirs::new(&base);

        let created = dirs.create_all().unwrap();
        assert_eq!(created.len(), 5);
        for name in ["cover", "pages", "raw", "processed", "generated"] {
            assert!(base.join(name).is_dir(), "{} missing", name);
        }
        assert_eq!(dirs.config_file(), base.join("generation_config.json"));

        // idempotent
        dirs.create_all().unwrap();

        std::fs::remove_dir_all(base.parent().unwrap()).ok();
    }
}
