//! BubbleBook CLI - illustration generation and book layout for the bubble story

mod commands;

use anyhow::Result;
use bubblebook_gen::ToolConfig;
use clap::{Parser, Subcommand};
use commands::{book, check, generate, init, prompts};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bubblebook")]
#[command(about = "Generate illustrations and lay out the bubble picture book", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the illustrations/ tree, generation config and batch scripts
    Init {
        /// Root of the illustrations tree (defaults to the configured base_dir)
        #[arg(long)]
        base: Option<String>,
    },

    /// Show the prompts for each page
    #[command(subcommand)]
    Prompts(prompts::PromptCommands),

    /// Generate illustrations with a text-to-image backend
    ///
    /// Images are sampled with the backend's multistep scheduler (DPM++ 2M),
    /// picked when the model loads. The `sampler` in generation_config.json
    /// only applies to the exported A1111 script and ComfyUI workflow.
    #[command(subcommand)]
    Generate(generate::GenerateCommands),

    /// Lay out the finished book as a PDF
    Book {
        /// Directory holding Cover.png, Page1.png, ...
        #[arg(long)]
        images: Option<String>,

        /// Book definition (TOML); the bundled story when omitted
        #[arg(long)]
        book: Option<String>,

        /// Output PDF path
        #[arg(short, long)]
        output: Option<String>,

        /// TrueType font with CJK coverage
        #[arg(long)]
        font: Option<String>,

        /// Resolution illustrations are embedded at
        #[arg(long)]
        dpi: Option<f32>,
    },

    /// Check that the configured backend is reachable
    Check {
        /// Backend to check (webui, script, mock)
        #[arg(long)]
        backend: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ToolConfig::load()?;

    match cli.command {
        Commands::Init { base } => init::run(base.as_deref(), &config),
        Commands::Prompts(cmd) => prompts::run(cmd, &config),
        Commands::Generate(cmd) => generate::run(cmd, &config),
        Commands::Book {
            images,
            book,
            output,
            font,
            dpi,
        } => book::run(
            book::BookArgs {
                images,
                book,
                output,
                font,
                dpi,
            },
            &config,
        ),
        Commands::Check { backend } => check::run(backend.as_deref(), &config),
    }
}
