//! Illustration generation commands

use anyhow::{anyhow, Result};
use bubblebook_gen::backends::create_backend;
use bubblebook_gen::{BatchSummary, DriverConfig, GenerationDriver, IllustrationDirs, PromptCatalog, ToolConfig};
use clap::{Args, Subcommand};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand)]
pub enum GenerateCommands {
    /// Every page in the prompt catalog
    All {
        #[command(flatten)]
        opts: GenerateOptions,
    },

    /// A single page
    Page {
        /// Page id (e.g. page_05_burst)
        page_id: String,

        #[command(flatten)]
        opts: GenerateOptions,
    },

    /// The cover illustration
    Cover {
        #[command(flatten)]
        opts: GenerateOptions,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GenerateOptions {
    /// Images per page (defaults to the configured num_variations)
    #[arg(short = 'n', long)]
    variations: Option<u32>,

    /// Backend to use (webui, script, mock)
    #[arg(long)]
    backend: Option<String>,

    /// Model checkpoint
    #[arg(long)]
    model: Option<String>,

    /// Sampling steps
    #[arg(long)]
    steps: Option<u32>,

    /// Guidance scale
    #[arg(long)]
    cfg: Option<f32>,

    /// Fixed seed for reproducibility (-1 for random)
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i64>,

    /// Pause between backend calls in milliseconds
    #[arg(long)]
    pause_ms: Option<u64>,

    /// Path to generation_config.json (built-in prompts when absent)
    #[arg(long)]
    config: Option<String>,
}

pub fn run(cmd: GenerateCommands, config: &ToolConfig) -> Result<()> {
    let (target, opts) = match cmd {
        GenerateCommands::All { opts } => (None, opts),
        GenerateCommands::Page { page_id, opts } => (Some(page_id), opts),
        GenerateCommands::Cover { opts } => (Some("cover".to_string()), opts),
    };

    let num_variations = opts.variations.unwrap_or(config.num_variations());
    if num_variations == 0 {
        anyhow::bail!("--variations must be at least 1");
    }

    let catalog = load_catalog(&opts, config)?;
    if let Some(ref page_id) = target {
        if !catalog.contains(page_id) {
            anyhow::bail!(
                "Unknown page '{}'. Available: {}",
                page_id,
                catalog.page_ids().collect::<Vec<_>>().join(", ")
            );
        }
    }

    let backend_name = opts.backend.as_deref().unwrap_or(config.backend_name());
    let backend = create_backend(backend_name, config)?;

    let mut driver_config = DriverConfig::from_tool_config(config);
    if let Some(ms) = opts.pause_ms {
        driver_config.pause = Duration::from_millis(ms);
    }
    let mut driver = GenerationDriver::new(backend, catalog, driver_config);

    let model = opts.model.as_deref().unwrap_or(config.model());
    let session = driver
        .load_model(model)
        .map_err(|e| anyhow!("Failed to load model '{}' on {}: {}", model, backend_name, e))?;
    println!(
        "Model: {} on {} (sampler {}{})",
        session.model,
        session.device,
        session.sampler,
        if session.low_memory { ", low memory" } else { "" }
    );

    let results: IndexMap<String, Vec<PathBuf>> = match target {
        None => driver.generate_all_images(num_variations)?,
        Some(page_id) => {
            let paths = driver
                .generate_single_page(&page_id, num_variations)
                .ok_or_else(|| anyhow!("Could not generate '{}'", page_id))?;
            IndexMap::from([(page_id, paths)])
        }
    };

    report(&results, num_variations, driver.output_dir())
}

fn load_catalog(opts: &GenerateOptions, config: &ToolConfig) -> Result<PromptCatalog> {
    let path = opts
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| IllustrationDirs::new(config.base_dir()).config_file());
    let mut catalog = PromptCatalog::load_or_builtin(&path)?;

    if let Some(steps) = opts.steps {
        catalog.parameters.steps = steps;
    }
    if let Some(cfg) = opts.cfg {
        catalog.parameters.guidance_scale = cfg;
    }
    if let Some(seed) = opts.seed {
        catalog.parameters.seed = seed;
    }
    catalog.parameters.validate()?;
    Ok(catalog)
}

fn report(results: &IndexMap<String, Vec<PathBuf>>, num_variations: u32, output_dir: &Path) -> Result<()> {
    println!();
    for (page_id, paths) in results {
        println!("{}: {}/{} image(s)", page_id, paths.len(), num_variations);
        for path in paths {
            println!("  {}", path.display());
        }
    }

    let summary = BatchSummary::from_results(results, num_variations);
    println!(
        "\n{} image(s) for {}/{} page(s), {} failed. Output: {}",
        summary.images_produced,
        summary.pages_with_output,
        summary.pages_attempted,
        summary.images_failed,
        output_dir.display()
    );

    if summary.images_produced == 0 {
        anyhow::bail!("No images were produced");
    }
    Ok(())
}
