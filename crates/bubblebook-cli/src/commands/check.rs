//! Backend health check

use anyhow::Result;
use bubblebook_gen::backends::{available_backends, create_backend};
use bubblebook_gen::{BackendStatus, IllustrationDirs, ToolConfig};

pub fn run(backend: Option<&str>, config: &ToolConfig) -> Result<()> {
    let name = backend.unwrap_or(config.backend_name());
    println!("Backends: {}", available_backends().join(", "));
    println!("Selected: {}", name);
    println!("Model: {}", config.model());
    if name == "webui" {
        println!("WebUI: {}", config.webui_url());
    }

    let dirs = IllustrationDirs::new(config.base_dir());
    let config_file = dirs.config_file();
    if config_file.exists() {
        println!("Prompts: {}", config_file.display());
    } else {
        println!("Prompts: built-in (run `bubblebook init` to write {})", config_file.display());
    }

    let backend = create_backend(name, config)?;
    match backend.health_check()? {
        BackendStatus::Available => {
            println!("Status: available");
            Ok(())
        }
        BackendStatus::Unavailable(reason) => {
            anyhow::bail!("Backend '{}' is unavailable: {}", name, reason)
        }
    }
}
