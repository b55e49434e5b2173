//! Prompt display commands

use anyhow::Result;
use bubblebook_gen::style::format_catalog;
use bubblebook_gen::{FormattedPrompt, IllustrationDirs, PromptCatalog, ToolConfig};
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PromptCommands {
    /// Print every prompt with the generation parameters
    Show {
        /// Path to generation_config.json (built-in prompts when absent)
        #[arg(long)]
        config: Option<String>,

        /// Only this page id
        #[arg(long)]
        page: Option<String>,
    },

    /// Print one-line prompts for pasting into a web UI
    Copy {
        /// Path to generation_config.json (built-in prompts when absent)
        #[arg(long)]
        config: Option<String>,

        /// Only this page id
        #[arg(long)]
        page: Option<String>,
    },
}

pub fn run(cmd: PromptCommands, config: &ToolConfig) -> Result<()> {
    match cmd {
        PromptCommands::Show { config: path, page } => {
            let catalog = load_catalog(path, config)?;
            let prompts = select(&catalog, page.as_deref())?;

            let params = &catalog.parameters;
            println!(
                "{}x{}, {} steps, cfg {}, sampler {}, seed {}",
                params.width,
                params.height,
                params.steps,
                params.guidance_scale,
                params.sampler_name,
                if params.is_random_seed() {
                    "random".to_string()
                } else {
                    params.seed.to_string()
                }
            );
            println!("Recommended models: {}\n", catalog.model_recommendations.join(", "));

            for prompt in prompts {
                println!("[{}]", prompt.page_id);
                println!("  Positive: {}", prompt.positive);
                println!("  Negative: {}", prompt.negative);
                println!();
            }
            Ok(())
        }
        PromptCommands::Copy { config: path, page } => {
            let catalog = load_catalog(path, config)?;
            for prompt in select(&catalog, page.as_deref())? {
                println!("{}: {}", prompt.page_id, prompt.copy_line());
            }
            Ok(())
        }
    }
}

fn load_catalog(path: Option<String>, config: &ToolConfig) -> Result<PromptCatalog> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(|| IllustrationDirs::new(config.base_dir()).config_file());
    Ok(PromptCatalog::load_or_builtin(&path)?)
}

fn select(catalog: &PromptCatalog, page: Option<&str>) -> Result<Vec<FormattedPrompt>> {
    let prompts = format_catalog(catalog);
    match page {
        None => Ok(prompts),
        Some(id) => {
            let matched: Vec<_> = prompts.into_iter().filter(|p| p.page_id == id).collect();
            if matched.is_empty() {
                anyhow::bail!(
                    "Unknown page '{}'. Available: {}",
                    id,
                    catalog.page_ids().collect::<Vec<_>>().join(", ")
                );
            }
            Ok(matched)
        }
    }
}
