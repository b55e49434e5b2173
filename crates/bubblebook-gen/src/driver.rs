//! Illustration generation driver
//!
//! Owns the loaded model session and walks the prompt catalog, producing
//! numbered variations per page. A failed image is logged and skipped so one
//! bad prompt never aborts the batch.

use crate::backend::{ImageBackend, ModelSession, Txt2ImgRequest};
use crate::catalog::{PromptCatalog, PromptEntry};
use crate::config::ToolConfig;
use crate::manifest::{now_rfc3339, GeneratedImageRef, GenerationManifest, ManifestEntry, MANIFEST_FILE_NAME};
use crate::style::StyleTags;
use crate::workspace::IllustrationDirs;
use bubblebook_core::{BookError, ContentHash, Result};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Where images go and how fast the backend is driven
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub output_dir: PathBuf,
    /// Sleep between consecutive sampling passes
    pub pause: Duration,
}

impl DriverConfig {
    pub fn from_tool_config(config: &ToolConfig) -> Self {
        Self {
            output_dir: IllustrationDirs::new(config.base_dir()).generated(),
            pause: Duration::from_millis(config.pause_ms()),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            output_dir: IllustrationDirs::default().generated(),
            pause: Duration::from_secs(1),
        }
    }
}

/// Counts for one batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub pages_attempted: usize,
    pub pages_with_output: usize,
    pub images_produced: usize,
    pub images_failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &IndexMap<String, Vec<PathBuf>>, num_variations: u32) -> Self {
        let images_produced: usize = results.values().map(Vec::len).sum();
        let requested = results.len() * num_variations as usize;
        Self {
            pages_attempted: results.len(),
            pages_with_output: results.values().filter(|paths| !paths.is_empty()).count(),
            images_produced,
            images_failed: requested.saturating_sub(images_produced),
        }
    }
}

/// Output file name for one variation (`{page_id}_v{n}`, 1-based)
pub fn variation_id(page_id: &str, index: u32) -> String {
    format!("{}_v{}", page_id, index)
}

/// Drives a backend through the prompt catalog
pub struct GenerationDriver {
    backend: Box<dyn ImageBackend>,
    catalog: PromptCatalog,
    style: StyleTags,
    config: DriverConfig,
    session: Option<ModelSession>,
    manifest: GenerationManifest,
    generated: Vec<GeneratedImageRef>,
    calls_made: usize,
}

impl GenerationDriver {
    pub fn new(backend: Box<dyn ImageBackend>, catalog: PromptCatalog, config: DriverConfig) -> Self {
        let manifest_path = config.output_dir.join(MANIFEST_FILE_NAME);
        let manifest = GenerationManifest::load_or_new(&manifest_path).unwrap_or_else(|e| {
            tracing::warn!(path = %manifest_path.display(), "starting a fresh manifest: {}", e);
            GenerationManifest::new()
        });
        let style = StyleTags::from_catalog(&catalog);

        Self {
            backend,
            catalog,
            style,
            config,
            session: None,
            manifest,
            generated: Vec::new(),
            calls_made: 0,
        }
    }

    pub fn catalog(&self) -> &PromptCatalog {
        &self.catalog
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn session(&self) -> Option<&ModelSession> {
        self.session.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn manifest(&self) -> &GenerationManifest {
        &self.manifest
    }

    /// Catalog variations produced by this driver, in generation order
    pub fn generated(&self) -> &[GeneratedImageRef] {
        &self.generated
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Load a model onto the backend. On failure the driver stays unloaded.
    pub fn load_model(&mut self, model: &str) -> Result<ModelSession> {
        tracing::info!(backend = self.backend.name(), model, "loading model");
        match self.backend.load_model(model) {
            Ok(session) => {
                tracing::info!(
                    device = %session.device,
                    sampler = %session.sampler,
                    low_memory = session.low_memory,
                    "model ready"
                );
                self.session = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                tracing::error!(model, "failed to load model: {}", e);
                self.session = None;
                Err(e)
            }
        }
    }

    /// Generate one image and write `{output_id}.png` to the output directory.
    ///
    /// The catalog's style suffix is appended to `positive`. Returns `None`
    /// after logging when anything goes wrong.
    pub fn generate_image(
        &mut self,
        positive: &str,
        negative: &str,
        output_id: &str,
        steps: u32,
        guidance_scale: f32,
    ) -> Option<PathBuf> {
        self.sample(positive, negative, output_id, steps, guidance_scale)
            .map(|(path, _)| path)
    }

    /// Generate `num_variations` images for every catalog entry, in catalog order.
    ///
    /// Every page appears in the result, with an empty list when all of its
    /// variations failed.
    pub fn generate_all_images(&mut self, num_variations: u32) -> Result<IndexMap<String, Vec<PathBuf>>> {
        if self.session.is_none() {
            return Err(BookError::ModelNotLoaded);
        }

        let entries: Vec<PromptEntry> = self.catalog.entries().collect();
        tracing::info!(
            pages = entries.len(),
            variations = num_variations,
            "generating illustrations"
        );

        let mut results = IndexMap::new();
        for (i, entry) in entries.iter().enumerate() {
            tracing::info!("[{}/{}] {}", i + 1, entries.len(), entry.page_id);
            let paths = self.generate_variations(entry, num_variations);
            if paths.is_empty() {
                tracing::warn!(page = %entry.page_id, "no images produced");
            }
            results.insert(entry.page_id.clone(), paths);
        }

        self.save_manifest();

        let summary = BatchSummary::from_results(&results, num_variations);
        tracing::info!(
            images = summary.images_produced,
            failed = summary.images_failed,
            output = %self.config.output_dir.display(),
            "batch finished"
        );
        Ok(results)
    }

    /// Generate variations for one page. `None` for an unknown page id or
    /// when no model is loaded; the backend is not touched in either case.
    pub fn generate_single_page(&mut self, page_id: &str, num_variations: u32) -> Option<Vec<PathBuf>> {
        let Some(entry) = self.catalog.get(page_id) else {
            tracing::error!(page = page_id, "page id not found in prompt catalog");
            return None;
        };
        if self.session.is_none() {
            tracing::error!("no model loaded");
            return None;
        }

        let paths = self.generate_variations(&entry, num_variations);
        self.save_manifest();
        Some(paths)
    }

    fn generate_variations(&mut self, entry: &PromptEntry, num_variations: u32) -> Vec<PathBuf> {
        let steps = self.catalog.parameters.steps;
        let guidance_scale = self.catalog.parameters.guidance_scale;

        let mut paths = Vec::new();
        for index in 1..=num_variations {
            let output_id = variation_id(&entry.page_id, index);
            if let Some((path, record)) = self.sample(
                &entry.positive_prompt,
                &entry.negative_prompt,
                &output_id,
                steps,
                guidance_scale,
            ) {
                let record = ManifestEntry {
                    page_id: entry.page_id.clone(),
                    variation_index: index,
                    ..record
                };
                self.generated.push(record.image_ref());
                self.manifest.add_entry(record);
                paths.push(path);
            }
        }
        paths
    }

    /// One sampling pass; pauses first when a previous pass already ran.
    ///
    /// Sampling uses the session's sampler (the multistep scheduler chosen at
    /// load time); the catalog's `sampler_name` only feeds exported scripts.
    fn sample(
        &mut self,
        positive: &str,
        negative: &str,
        output_id: &str,
        steps: u32,
        guidance_scale: f32,
    ) -> Option<(PathBuf, ManifestEntry)> {
        if self.calls_made > 0 && !self.config.pause.is_zero() {
            std::thread::sleep(self.config.pause);
        }
        self.calls_made += 1;

        match self.try_sample(positive, negative, output_id, steps, guidance_scale) {
            Ok(done) => {
                tracing::info!(path = %done.0.display(), "saved");
                Some(done)
            }
            Err(e) => {
                tracing::error!(output = output_id, "generation failed: {}", e);
                None
            }
        }
    }

    fn try_sample(
        &self,
        positive: &str,
        negative: &str,
        output_id: &str,
        steps: u32,
        guidance_scale: f32,
    ) -> Result<(PathBuf, ManifestEntry)> {
        let session = self.session.as_ref().ok_or(BookError::ModelNotLoaded)?;
        let params = &self.catalog.parameters;

        let request = Txt2ImgRequest {
            prompt: self.style.enrich_prompt(positive),
            negative_prompt: negative.to_string(),
            width: params.width,
            height: params.height,
            steps,
            guidance_scale,
            sampler_name: session.sampler.clone(),
            seed: params.resolve_seed(),
        };
        tracing::debug!(seed = request.seed, steps, "sampling {}", output_id);

        let start = Instant::now();
        let bytes = self.backend.txt2img(&request)?;
        let duration = start.elapsed();

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| BookError::ImageError(format!("backend returned an unreadable image: {}", e)))?;

        std::fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(format!("{}.png", output_id));
        decoded
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| BookError::ImageError(format!("failed to write {}: {}", path.display(), e)))?;

        let record = ManifestEntry {
            page_id: output_id.to_string(),
            variation_index: 1,
            file_path: path.display().to_string(),
            backend: self.backend.name().to_string(),
            model: session.model.clone(),
            prompt: request.prompt,
            negative_prompt: request.negative_prompt,
            seed: request.seed,
            steps,
            guidance_scale,
            content_hash: ContentHash::of_file(&path)?.to_prefixed_hex(),
            generated_at: now_rfc3339(),
            duration_secs: duration.as_secs_f64(),
        };
        Ok((path, record))
    }

    fn save_manifest(&self) {
        let path = self.config.output_dir.join(MANIFEST_FILE_NAME);
        if let Err(e) = self.manifest.save(&path) {
            tracing::warn!(path = %path.display(), "failed to save manifest: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendStatus, Device, MULTISTEP_SAMPLER};
    use crate::backends::mock::{solid_png, MockBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Requests = Arc<Mutex<Vec<Txt2ImgRequest>>>;

    /// Counts calls, records every request and fails selected calls
    struct ScriptedBackend {
        calls: Arc<AtomicUsize>,
        requests: Requests,
        fail_calls: Vec<usize>,
    }

    impl ScriptedBackend {
        fn new(fail_calls: Vec<usize>) -> (Self, Arc<AtomicUsize>, Requests) {
            let calls = Arc::new(AtomicUsize::new(0));
            let requests = Arc::new(Mutex::new(Vec::new()));
            let backend = Self {
                calls: calls.clone(),
                requests: requests.clone(),
                fail_calls,
            };
            (backend, calls, requests)
        }
    }

    impl ImageBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn health_check(&self) -> Result<BackendStatus> {
            Ok(BackendStatus::Available)
        }

        fn load_model(&mut self, model: &str) -> Result<ModelSession> {
            if model == "missing.safetensors" {
                return Err(BookError::BackendError("Checkpoint not found".to_string()));
            }
            Ok(ModelSession {
                model: model.to_string(),
                device: Device::Cpu,
                sampler: MULTISTEP_SAMPLER.to_string(),
                low_memory: false,
            })
        }

        fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_calls.contains(&call) {
                return Err(BookError::BackendError("out of memory".to_string()));
            }
            solid_png(&request.prompt, request.width, request.height)
        }
    }

    fn temp_output() -> PathBuf {
        std::env::temp_dir().join(format!("bubblebook_driver_test_{}", uuid::Uuid::new_v4()))
    }

    fn small_catalog(page_ids: &[&str]) -> PromptCatalog {
        let mut catalog = PromptCatalog::empty();
        catalog.parameters.width = 16;
        catalog.parameters.height = 16;
        catalog.style_tags = vec!["soft watercolor".to_string()];
        for id in page_ids {
            catalog.insert(id, &format!("a bubble for {}", id), "dark, scary");
        }
        catalog
    }

    fn driver_with(backend: Box<dyn ImageBackend>, catalog: PromptCatalog, output: &Path) -> GenerationDriver {
        let config = DriverConfig {
            output_dir: output.to_path_buf(),
            pause: Duration::ZERO,
        };
        GenerationDriver::new(backend, catalog, config)
    }

    #[test]
    fn test_cover_variations_end_to_end() {
        let output = temp_output();
        let mut driver = driver_with(Box::new(MockBackend::new()), small_catalog(&["cover"]), &output);
        driver.load_model("dreamshaper_8.safetensors").unwrap();

        let paths = driver.generate_single_page("cover", 2).unwrap();
        assert_eq!(paths, vec![output.join("cover_v1.png"), output.join("cover_v2.png")]);
        for path in &paths {
            let img = image::open(path).unwrap();
            assert_eq!((img.width(), img.height()), (16, 16));
        }
        assert_eq!(driver.manifest().entries.len(), 2);
        assert!(output.join(MANIFEST_FILE_NAME).exists());

        let refs = driver.generated();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].page_id, "cover");
        assert_eq!(refs[1].variation_index, 2);
        assert_eq!(refs[1].file_path, output.join("cover_v2.png").display().to_string());

        std::fs::remove_dir_all(&output).ok();
    }

    #[test]
    fn test_unknown_page_does_not_touch_backend() {
        let output = temp_output();
        let (backend, calls, _) = ScriptedBackend::new(vec![]);
        let mut driver = driver_with(Box::new(backend), small_catalog(&["cover"]), &output);
        driver.load_model("dreamshaper_8.safetensors").unwrap();

        assert!(driver.generate_single_page("page_42", 3).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!output.exists());
    }

    #[test]
    fn test_generate_all_requires_model() {
        let output = temp_output();
        let (backend, calls, _) = ScriptedBackend::new(vec![]);
        let mut driver = driver_with(Box::new(backend), small_catalog(&["cover"]), &output);

        assert!(matches!(driver.generate_all_images(1), Err(BookError::ModelNotLoaded)));
        assert!(driver.generate_single_page("cover", 1).is_none());
        assert!(driver.generate_image("a bubble", "", "loose", 20, 7.5).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_load_leaves_driver_unloaded() {
        let output = temp_output();
        let (backend, _, _) = ScriptedBackend::new(vec![]);
        let mut driver = driver_with(Box::new(backend), small_catalog(&["cover"]), &output);

        assert!(driver.load_model("missing.safetensors").is_err());
        assert!(!driver.is_loaded());
    }

    #[test]
    fn test_partial_failure_keeps_going() {
        let output = temp_output();
        let (backend, calls, _) = ScriptedBackend::new(vec![2]);
        let catalog = small_catalog(&["cover", "page_01_birth", "page_02_mirror"]);
        let mut driver = driver_with(Box::new(backend), catalog, &output);
        driver.load_model("dreamshaper_8.safetensors").unwrap();

        let results = driver.generate_all_images(2).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(
            results.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["cover", "page_01_birth", "page_02_mirror"]
        );
        assert_eq!(results["cover"], vec![output.join("cover_v1.png")]);
        assert_eq!(results["page_02_mirror"].len(), 2);

        let summary = BatchSummary::from_results(&results, 2);
        assert_eq!(summary.pages_attempted, 3);
        assert_eq!(summary.pages_with_output, 3);
        assert_eq!(summary.images_produced, 5);
        assert_eq!(summary.images_failed, 1);
        assert!(!output.join("cover_v2.png").exists());
        assert_eq!(driver.generated().len(), 5);
        assert!(!driver.generated().iter().any(|r| r.page_id == "cover" && r.variation_index == 2));

        std::fs::remove_dir_all(&output).ok();
    }

    #[test]
    fn test_style_suffix_and_pinned_seed() {
        let output = temp_output();
        let (backend, _, requests) = ScriptedBackend::new(vec![]);
        let mut catalog = small_catalog(&["cover"]);
        catalog.parameters.seed = 1234;
        catalog.parameters.sampler_name = "euler_a".to_string();
        let mut driver = driver_with(Box::new(backend), catalog, &output);
        driver.load_model("dreamshaper_8.safetensors").unwrap();

        let path = driver.generate_image("a bubble", "dark", "test_image", 30, 6.0).unwrap();
        assert_eq!(path, output.join("test_image.png"));

        let request = requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(request.prompt, "a bubble, soft watercolor");
        assert_eq!(request.negative_prompt, "dark");
        assert_eq!(request.seed, 1234);
        assert_eq!(request.steps, 30);
        assert_eq!(request.sampler_name, MULTISTEP_SAMPLER);
        // Loose images are not part of the manifest
        assert!(driver.manifest().entries.is_empty());
        assert!(driver.generated().is_empty());

        std::fs::remove_dir_all(&output).ok();
    }

    #[test]
    fn test_random_seed_differs_per_variation() {
        let output = temp_output();
        let (backend, _, requests) = ScriptedBackend::new(vec![]);
        let catalog = small_catalog(&["page_01_birth"]);
        assert!(catalog.parameters.is_random_seed());
        let mut driver = driver_with(Box::new(backend), catalog, &output);
        driver.load_model("dreamshaper_8.safetensors").unwrap();

        driver.generate_single_page("page_01_birth", 3).unwrap();
        let mut seeds: Vec<i64> = requests.lock().unwrap().iter().map(|r| r.seed).collect();
        assert_eq!(seeds.len(), 3);
        assert!(seeds.iter().all(|s| *s >= 0));
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), 3);

        let recorded: Vec<i64> = driver.manifest().entries.iter().map(|e| e.seed).collect();
        assert_eq!(recorded.len(), 3);

        std::fs::remove_dir_all(&output).ok();
    }

    #[test]
    fn test_pinned_seed_reused_across_variations() {
        let output = temp_output();
        let (backend, _, requests) = ScriptedBackend::new(vec![]);
        let mut catalog = small_catalog(&["cover"]);
        catalog.parameters.seed = 99;
        let mut driver = driver_with(Box::new(backend), catalog, &output);
        driver.load_model("dreamshaper_8.safetensors").unwrap();

        driver.generate_single_page("cover", 2).unwrap();
        assert!(requests.lock().unwrap().iter().all(|r| r.seed == 99));

        std::fs::remove_dir_all(&output).ok();
    }

    #[test]
    fn test_variation_id() {
        assert_eq!(variation_id("page_05_burst", 3), "page_05_burst_v3");
    }
}
