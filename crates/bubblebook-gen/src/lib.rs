//! BubbleBook Gen - illustration generation for the picture book
//!
//! Holds the per-page prompt catalog and shared style tags, persists them as
//! config and batch-tool scripts, and drives a pluggable text-to-image
//! backend (Stable Diffusion WebUI, a local txt2img program, or a mock)
//! through the catalog with a generation manifest.

pub mod backend;
pub mod backends;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod manifest;
pub mod persist;
pub mod style;
pub mod workspace;

pub use backend::{BackendStatus, Device, ImageBackend, ModelSession, Txt2ImgRequest};
pub use catalog::{GenerationParameters, PromptCatalog, PromptEntry};
pub use config::ToolConfig;
pub use driver::{BatchSummary, DriverConfig, GenerationDriver};
pub use manifest::{GeneratedImageRef, GenerationManifest, ManifestEntry};
pub use style::{FormattedPrompt, StyleTags};
pub use workspace::IllustrationDirs;
