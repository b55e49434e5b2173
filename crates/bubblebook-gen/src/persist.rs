//! Generation config persistence and batch-tool artifacts
//!
//! Writes the prompt catalog to `generation_config.json` and renders the same
//! catalog for tools run outside this process: an AUTOMATIC1111 shell script,
//! a ComfyUI workflow graph and a markdown walkthrough for manual runs.

use crate::catalog::PromptCatalog;
use crate::workspace::IllustrationDirs;
use bubblebook_core::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const AUTO1111_SCRIPT_NAME: &str = "generate_auto1111.sh";
pub const COMFYUI_WORKFLOW_NAME: &str = "comfyui_workflow.json";
pub const MANUAL_INSTRUCTIONS_NAME: &str = "MANUAL_INSTRUCTIONS.md";

/// Files written by [`persist_all`]
#[derive(Debug, Clone)]
pub struct PersistedFiles {
    pub config: PathBuf,
    pub auto1111_script: PathBuf,
    pub comfyui_workflow: PathBuf,
    pub instructions: PathBuf,
}

/// Write the catalog as pretty-printed JSON (non-ASCII kept as-is)
pub fn save_generation_config(catalog: &PromptCatalog, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(catalog)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Reload a catalog written by [`save_generation_config`]
pub fn load_generation_config(path: &Path) -> Result<PromptCatalog> {
    PromptCatalog::load(path)
}

/// Render the AUTOMATIC1111 batch script for every catalog entry
pub fn render_auto1111_script(catalog: &PromptCatalog, output_dir: &Path) -> String {
    let params = &catalog.parameters;
    let mut script = String::new();

    script.push_str("#!/bin/bash\n");
    script.push_str("# AUTOMATIC1111 WebUI batch generation script\n\n");
    let _ = writeln!(script, "MODEL=\"{}\"", shell_escape(catalog.primary_model()));
    let _ = writeln!(
        script,
        "OUTPUT_DIR=\"{}\"",
        shell_escape(&output_dir.to_string_lossy())
    );
    let _ = writeln!(
        script,
        "STYLE_TAGS=\"{}\"",
        shell_escape(&catalog.style_tags.join(", "))
    );
    script.push_str("\necho \"Generating illustrations...\"\n");

    for entry in catalog.entries() {
        let _ = write!(
            script,
            r#"
# {page_id}
echo "Generating {page_id}..."
python scripts/txt2img.py \
    --prompt "{prompt}, $STYLE_TAGS" \
    --negative_prompt "{negative}" \
    --width {width} \
    --height {height} \
    --steps {steps} \
    --cfg_scale {cfg} \
    --sampler_name {sampler} \
    --batch_size {batch} \
    --output_dir "$OUTPUT_DIR" \
    --filename "{page_id}.png"
"#,
            page_id = entry.page_id,
            prompt = shell_escape(&entry.positive_prompt),
            negative = shell_escape(&entry.negative_prompt),
            width = params.width,
            height = params.height,
            steps = params.steps,
            cfg = params.guidance_scale,
            sampler = params.sampler_name,
            batch = params.batch_size,
        );
    }

    script.push_str("\necho \"All illustrations generated.\"\n");
    script.push_str("echo \"Check the results in $OUTPUT_DIR\"\n");
    script
}

/// Write the batch script next to the config and mark it executable
pub fn write_auto1111_script(catalog: &PromptCatalog, dirs: &IllustrationDirs) -> Result<PathBuf> {
    let path = dirs.base().join(AUTO1111_SCRIPT_NAME);
    std::fs::write(&path, render_auto1111_script(catalog, &dirs.raw()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(path)
}

/// ComfyUI API-format workflow graph.
///
/// Prompt nodes carry `{prompt}`, `{negative}` and `{page_id}` placeholders
/// that are filled in per page inside ComfyUI.
pub fn comfyui_workflow(catalog: &PromptCatalog) -> serde_json::Value {
    let params = &catalog.parameters;
    serde_json::json!({
        "1": {
            "inputs": { "ckpt_name": catalog.primary_model() },
            "class_type": "CheckpointLoaderSimple",
            "_meta": { "title": "Load Checkpoint" }
        },
        "2": {
            "inputs": { "text": "{prompt}", "clip": ["1", 1] },
            "class_type": "CLIPTextEncode",
            "_meta": { "title": "CLIP Text Encode (Prompt)" }
        },
        "3": {
            "inputs": { "text": "{negative}", "clip": ["1", 1] },
            "class_type": "CLIPTextEncode",
            "_meta": { "title": "CLIP Text Encode (Negative)" }
        },
        "4": {
            "inputs": {
                "seed": params.seed,
                "steps": params.steps,
                "cfg": params.guidance_scale,
                "sampler_name": params.sampler_name,
                "scheduler": "normal",
                "denoise": 1.0,
                "model": ["1", 0],
                "positive": ["2", 0],
                "negative": ["3", 0],
                "latent_image": ["5", 0]
            },
            "class_type": "KSampler",
            "_meta": { "title": "KSampler" }
        },
        "5": {
            "inputs": {
                "width": params.width,
                "height": params.height,
                "batch_size": params.batch_size
            },
            "class_type": "EmptyLatentImage",
            "_meta": { "title": "Empty Latent Image" }
        },
        "6": {
            "inputs": { "samples": ["4", 0], "vae": ["1", 2] },
            "class_type": "VAEDecode",
            "_meta": { "title": "VAE Decode" }
        },
        "7": {
            "inputs": { "filename_prefix": "{page_id}", "images": ["6", 0] },
            "class_type": "SaveImage",
            "_meta": { "title": "Save Image" }
        }
    })
}

pub fn write_comfyui_workflow(catalog: &PromptCatalog, dirs: &IllustrationDirs) -> Result<PathBuf> {
    let path = dirs.base().join(COMFYUI_WORKFLOW_NAME);
    let content = serde_json::to_string_pretty(&comfyui_workflow(catalog))?;
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Step-by-step notes for running the catalog by hand in a web UI
pub fn render_manual_instructions(catalog: &PromptCatalog) -> String {
    let params = &catalog.parameters;
    format!(
        r#"# Manual Generation

## AUTOMATIC1111 WebUI

1. Start the WebUI:
   ```bash
   cd /path/to/stable-diffusion-webui
   ./webui.sh
   ```
2. Open http://localhost:7860
3. Select the model: {model}
4. Settings:
   - Width: {width}
   - Height: {height}
   - Steps: {steps}
   - CFG Scale: {cfg}
   - Sampler: {sampler}
   - Batch size: {batch}
5. Enter each page's prompts from {config}

## ComfyUI

1. Start ComfyUI:
   ```bash
   cd /path/to/ComfyUI
   python main.py
   ```
2. Load {workflow}
3. Replace the prompt node placeholders per page

## Post-processing

1. Adjust colours so every page shares one palette
2. Strengthen the rainbow transparency of the bubbles
3. Leave room for the page text

## Quality checklist

- [ ] Bubble transparency reads correctly
- [ ] Colours are child friendly
- [ ] Composition is balanced
- [ ] Consistent with the other pages
- [ ] Print quality (300 DPI)
"#,
        model = catalog.primary_model(),
        width = params.width,
        height = params.height,
        steps = params.steps,
        cfg = params.guidance_scale,
        sampler = params.sampler_name,
        batch = params.batch_size,
        config = crate::workspace::CONFIG_FILE_NAME,
        workflow = COMFYUI_WORKFLOW_NAME,
    )
}

pub fn write_manual_instructions(catalog: &PromptCatalog, dirs: &IllustrationDirs) -> Result<PathBuf> {
    let path = dirs.base().join(MANUAL_INSTRUCTIONS_NAME);
    std::fs::write(&path, render_manual_instructions(catalog))?;
    Ok(path)
}

/// Create the directory tree and write every artifact
pub fn persist_all(catalog: &PromptCatalog, dirs: &IllustrationDirs) -> Result<PersistedFiles> {
    dirs.create_all()?;

    let config = dirs.config_file();
    save_generation_config(catalog, &config)?;
    tracing::info!(path = %config.display(), "saved generation config");

    let auto1111_script = write_auto1111_script(catalog, dirs)?;
    tracing::info!(path = %auto1111_script.display(), "wrote AUTOMATIC1111 script");

    let comfyui_workflow = write_comfyui_workflow(catalog, dirs)?;
    tracing::info!(path = %comfyui_workflow.display(), "wrote ComfyUI workflow");

    let instructions = write_manual_instructions(catalog, dirs)?;

    Ok(PersistedFiles {
        config,
        auto1111_script,
        comfyui_workflow,
        instructions,
    })
}

/// Escape text for use inside a double-quoted bash string
fn shell_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dirs() -> IllustrationDirs {
        IllustrationDirs::new(
            std::env::temp_dir()
                .join(format!("bubblebook_persist_test_{}", uuid::Uuid::new_v4()))
                .join("illustrations"),
        )
    }

    fn cleanup(dirs: &IllustrationDirs) {
        std::fs::remove_dir_all(dirs.base().parent().unwrap()).ok();
    }

    #[test]
    fn test_config_roundtrip_reproduces_catalog() {
        let dirs = temp_dirs();
        let catalog = PromptCatalog::builtin();

        save_generation_config(&catalog, &dirs.config_file()).unwrap();
        let loaded = load_generation_config(&dirs.config_file()).unwrap();

        assert_eq!(loaded, catalog);
        let original: Vec<&str> = catalog.page_ids().collect();
        let reloaded: Vec<&str> = loaded.page_ids().collect();
        assert_eq!(original, reloaded);

        cleanup(&dirs);
    }

    #[test]
    fn test_config_json_layout() {
        let dirs = temp_dirs();
        let mut catalog = PromptCatalog::empty();
        catalog.insert("cover", "P", "N");
        save_generation_config(&catalog, &dirs.config_file()).unwrap();

        let content = std::fs::read_to_string(dirs.config_file()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["illustrations"]["cover"]["prompt"], "P");
        assert_eq!(json["illustrations"]["cover"]["negative"], "N");
        assert_eq!(json["generation_config"]["sampler"], "euler_a");
        assert_eq!(json["generation_config"]["steps"], 50);
        assert!(json["model_recommendations"].is_array());
        assert_eq!(json["style_tags"].as_array().unwrap().len(), 5);

        cleanup(&dirs);
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let dirs = temp_dirs();
        let mut catalog = PromptCatalog::empty();
        catalog.insert("cover", "泡泡", "dark");
        save_generation_config(&catalog, &dirs.config_file()).unwrap();

        let content = std::fs::read_to_string(dirs.config_file()).unwrap();
        assert!(content.contains("泡泡"));

        cleanup(&dirs);
    }

    #[test]
    fn test_auto1111_script_has_every_page() {
        let catalog = PromptCatalog::builtin();
        let script = render_auto1111_script(&catalog, Path::new("/tmp/raw"));

        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("MODEL=\"dreamshaper_8.safetensors\""));
        assert!(script.contains("OUTPUT_DIR=\"/tmp/raw\""));
        for page_id in catalog.page_ids() {
            assert!(script.contains(&format!("--filename \"{}.png\"", page_id)));
        }
        assert!(script.contains("--sampler_name euler_a"));
        assert!(script.contains("--steps 50"));
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape(r#"say "hi" $HOME"#), r#"say \"hi\" \$HOME"#);
        assert_eq!(shell_escape("children's book"), "children's book");
    }

    #[test]
    fn test_comfyui_workflow_uses_parameters() {
        let mut catalog = PromptCatalog::builtin();
        catalog.parameters.steps = 30;
        let workflow = comfyui_workflow(&catalog);

        assert_eq!(workflow["4"]["class_type"], "KSampler");
        assert_eq!(workflow["4"]["inputs"]["steps"], 30);
        assert_eq!(workflow["5"]["inputs"]["width"], 1024);
        assert_eq!(workflow["1"]["inputs"]["ckpt_name"], "dreamshaper_8.safetensors");
        assert_eq!(workflow["7"]["inputs"]["filename_prefix"], "{page_id}");
    }

    #[test]
    fn test_persist_all_writes_artifacts() {
        let dirs = temp_dirs();
        let files = persist_all(&PromptCatalog::builtin(), &dirs).unwrap();

        assert!(files.config.exists());
        assert!(files.auto1111_script.exists());
        assert!(files.comfyui_workflow.exists());
        assert!(files.instructions.exists());
        assert!(dirs.generated().is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&files.auto1111_script).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        cleanup(&dirs);
    }
}
