//! Image backend trait and request/session types

use bubblebook_core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic multistep sampler configured when a model is loaded
/// (the DPM-Solver multistep scheduler)
pub const MULTISTEP_SAMPLER: &str = "DPM++ 2M";

/// Compute device the backend ended up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// A GPU or other accelerator
    Accelerated,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Accelerated => write!(f, "cuda"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

/// A model held in memory by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSession {
    pub model: String,
    pub device: Device,
    /// Sampler used for every pass of this session
    pub sampler: String,
    /// Memory-reduction options were applied
    pub low_memory: bool,
}

/// One sampling pass producing exactly one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
    pub sampler_name: String,
    pub seed: i64,
}

/// Status returned by a backend health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Available,
    Unavailable(String),
}

/// A text-to-image capability.
///
/// Implementations hold exclusive use of their compute device, so callers
/// issue one `txt2img` at a time.
pub trait ImageBackend: Send {
    /// Backend name (e.g. "webui", "script", "mock")
    fn name(&self) -> &str;

    /// Check whether the backend can be reached without loading anything
    fn health_check(&self) -> Result<BackendStatus>;

    /// Acquire a pretrained model and pick the device to run it on
    fn load_model(&mut self, model: &str) -> Result<ModelSession>;

    /// Run one sampling pass and return the encoded PNG bytes
    fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Vec<u8>>;
}
