//! Illustration workspace initialization

use anyhow::Result;
use bubblebook_gen::persist::persist_all;
use bubblebook_gen::{IllustrationDirs, PromptCatalog, ToolConfig};
use bubblebook_layout::BookFile;

pub const BOOK_FILE_NAME: &str = "book.toml";

pub fn run(base: Option<&str>, config: &ToolConfig) -> Result<()> {
    let dirs = IllustrationDirs::new(base.unwrap_or(config.base_dir()));

    // Keep prompt edits from an earlier init
    let catalog = PromptCatalog::load_or_builtin(&dirs.config_file())?;
    let files = persist_all(&catalog, &dirs)?;

    println!("Initialized illustrations in {}", dirs.base().display());
    for dir in [dirs.cover(), dirs.pages(), dirs.raw(), dirs.processed(), dirs.generated()] {
        println!("  {}/", dir.display());
    }

    println!();
    println!("  Config: {}", files.config.display());
    println!("  AUTOMATIC1111 script: {}", files.auto1111_script.display());
    println!("  ComfyUI workflow: {}", files.comfyui_workflow.display());
    println!("  Instructions: {}", files.instructions.display());

    let book_path = dirs.base().join(BOOK_FILE_NAME);
    if !book_path.exists() {
        BookFile::builtin().save(&book_path)?;
        println!("  Book pages: {}", book_path.display());
    }

    println!();
    println!("{} prompts ready. Next:", catalog.len());
    println!("  bubblebook generate all --variations 3");
    println!("  bubblebook book --images {}", dirs.pages().display());
    Ok(())
}
