//! AUTOMATIC1111 WebUI backend
//!
//! Talks to a running `stable-diffusion-webui` started with `--api`. The
//! server owns the GPU; loading a model means switching its active checkpoint.

use crate::backend::*;
use crate::config::ToolConfig;
use base64::Engine as _;
use bubblebook_core::{BookError, Result};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
/// Base64 PNGs at 1024x1024 exceed ureq's default body limit
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;
/// Below this much VRAM the server is asked to keep fewer checkpoints cached
const LOW_VRAM_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Backend for the AUTOMATIC1111 `/sdapi/v1` HTTP API
pub struct WebUiBackend {
    base_url: String,
    session: Option<ModelSession>,
}

impl WebUiBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    pub fn from_config(config: &ToolConfig) -> Result<Self> {
        let url = config.webui_url();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BookError::ConfigError(format!(
                "WebUI url must start with http:// or https://, got '{}'",
                url
            )));
        }
        Ok(Self::new(url))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/sdapi/v1/{}", self.base_url, path)
    }

    fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = self.endpoint(path);
        for attempt in 0..MAX_RETRIES {
            match build_agent().get(&url).call() {
                Ok(mut ok) => {
                    return ok.body_mut().read_json().map_err(|e| {
                        BookError::BackendError(format!("Failed to parse {} response: {}", path, e))
                    });
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(BookError::BackendError(format!("GET {} failed: {}", url, e)));
                }
            }
        }
        Err(BookError::BackendError(format!("GET {} failed after retries", url)))
    }

    /// POST with backoff; only for calls that are safe to repeat
    fn post_json(&self, path: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        self.post_json_with(path, payload, is_retryable_error)
    }

    /// POST a sampling pass. It is sent again only when it never reached the
    /// server; a pass the server failed or timed out on is not repeated.
    fn post_sample(&self, payload: &serde_json::Value) -> Result<serde_json::Value> {
        self.post_json_with("txt2img", payload, is_unsent_error)
    }

    fn post_json_with(
        &self,
        path: &str,
        payload: &serde_json::Value,
        retryable: fn(&ureq::Error) -> bool,
    ) -> Result<serde_json::Value> {
        let url = self.endpoint(path);
        for attempt in 0..MAX_RETRIES {
            let response = build_agent()
                .post(&url)
                .header("Content-Type", "application/json")
                .send_json(payload);

            match response {
                Ok(mut ok) => {
                    return ok
                        .body_mut()
                        .with_config()
                        .limit(MAX_RESPONSE_BYTES)
                        .read_json()
                        .map_err(|e| {
                            BookError::BackendError(format!(
                                "Failed to parse {} response: {}",
                                path, e
                            ))
                        });
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && retryable(&e) {
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(BookError::BackendError(format!("POST {} failed: {}", url, e)));
                }
            }
        }
        Err(BookError::BackendError(format!("POST {} failed after retries", url)))
    }

    /// Ask the server which device it is running on and how much memory it has
    fn detect_device(&self) -> (Device, Option<u64>) {
        match self.get_json("memory") {
            Ok(memory) => parse_memory_response(&memory),
            Err(e) => {
                tracing::warn!(error = %e, "could not query server memory, assuming cpu");
                (Device::Cpu, None)
            }
        }
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .build();
    config.into()
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    match e {
        ureq::Error::Timeout(_)
        | ureq::Error::Io(_)
        | ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound => true,
        ureq::Error::StatusCode(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
        _ => false,
    }
}

/// The request never left this machine
fn is_unsent_error(e: &ureq::Error) -> bool {
    matches!(e, ureq::Error::ConnectionFailed | ureq::Error::HostNotFound)
}

fn sleep_backoff(attempt: usize) {
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    std::thread::sleep(Duration::from_millis(delay_ms));
}

impl ImageBackend for WebUiBackend {
    fn name(&self) -> &str {
        "webui"
    }

    fn health_check(&self) -> Result<BackendStatus> {
        match self.get_json("sd-models") {
            Ok(_) => Ok(BackendStatus::Available),
            Err(e) => Ok(BackendStatus::Unavailable(e.to_string())),
        }
    }

    fn load_model(&mut self, model: &str) -> Result<ModelSession> {
        let models = self.get_json("sd-models")?;
        let title = find_checkpoint(&models, model)?;

        let (device, vram) = self.detect_device();
        let low_memory = match (device, vram) {
            (Device::Cpu, _) => true,
            (Device::Accelerated, Some(total)) => total < LOW_VRAM_BYTES,
            (Device::Accelerated, None) => false,
        };

        let mut options = serde_json::json!({ "sd_model_checkpoint": title });
        if low_memory {
            options["sd_checkpoint_cache"] = serde_json::json!(0);
            options["sd_vae_checkpoint_cache"] = serde_json::json!(0);
        }
        self.post_json("options", &options)?;

        let session = ModelSession {
            model: title,
            device,
            sampler: MULTISTEP_SAMPLER.to_string(),
            low_memory,
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Vec<u8>> {
        if self.session.is_none() {
            return Err(BookError::ModelNotLoaded);
        }

        let payload = serde_json::json!({
            "prompt": request.prompt,
            "negative_prompt": request.negative_prompt,
            "width": request.width,
            "height": request.height,
            "steps": request.steps,
            "cfg_scale": request.guidance_scale,
            "sampler_name": request.sampler_name,
            "seed": request.seed,
            "batch_size": 1,
            "n_iter": 1,
        });

        let response = self.post_sample(&payload)?;
        parse_txt2img_response(&response)
    }
}

/// Match a requested model against `/sdapi/v1/sd-models`, returning its title
pub fn find_checkpoint(models: &serde_json::Value, wanted: &str) -> Result<String> {
    let list = models.as_array().ok_or_else(|| {
        BookError::BackendError("Unexpected sd-models response format".to_string())
    })?;

    let stem = wanted
        .trim_end_matches(".safetensors")
        .trim_end_matches(".ckpt");

    for entry in list {
        let title = entry.get("title").and_then(|t| t.as_str()).unwrap_or("");
        let name = entry.get("model_name").and_then(|n| n.as_str()).unwrap_or("");
        let filename = entry.get("filename").and_then(|f| f.as_str()).unwrap_or("");

        if title == wanted || name == stem || title.starts_with(wanted) || filename.ends_with(wanted) {
            return Ok(title.to_string());
        }
    }

    let available: Vec<&str> = list
        .iter()
        .filter_map(|m| m.get("title").and_then(|t| t.as_str()))
        .collect();
    Err(BookError::BackendError(format!(
        "Model '{}' is not installed on the server (available: {})",
        wanted,
        if available.is_empty() {
            "none".to_string()
        } else {
            available.join(", ")
        }
    )))
}

/// Read the device and total VRAM out of a `/sdapi/v1/memory` response
pub fn parse_memory_response(memory: &serde_json::Value) -> (Device, Option<u64>) {
    let cuda = memory.get("cuda");
    let total = cuda
        .and_then(|c| c.get("system"))
        .and_then(|s| s.get("total"))
        .and_then(|t| t.as_f64())
        .filter(|t| *t > 0.0);

    match total {
        Some(bytes) => (Device::Accelerated, Some(bytes as u64)),
        None => (Device::Cpu, None),
    }
}

/// Decode the first image of a `/sdapi/v1/txt2img` response
pub fn parse_txt2img_response(response: &serde_json::Value) -> Result<Vec<u8>> {
    let encoded = response
        .get("images")
        .and_then(|imgs| imgs.as_array())
        .and_then(|arr| arr.first())
        .and_then(|img| img.as_str())
        .ok_or_else(|| BookError::BackendError("No image in txt2img response".to_string()))?;

    // Some builds prefix a data URL header
    let encoded = encoded
        .split_once(',')
        .filter(|(head, _)| head.starts_with("data:"))
        .map(|(_, body)| body)
        .unwrap_or(encoded);

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| BookError::BackendError(format!("Invalid base64 image: {}", e)))
}
