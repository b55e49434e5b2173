//! External txt2img program backend
//!
//! Runs a local Stable Diffusion script (e.g. `python scripts/txt2img.py`)
//! once per image and reads back the file it wrote.

use crate::backend::*;
use crate::config::ToolConfig;
use bubblebook_core::{BookError, Result};
use std::path::PathBuf;
use std::process::Command;

/// Output file of one run, removed on drop whether or not the run succeeded
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        std::fs::remove_file(&self.0).ok();
    }
}

/// Backend that shells out to a txt2img program
pub struct ScriptBackend {
    program: String,
    base_args: Vec<String>,
    workdir: Option<PathBuf>,
    accelerated: bool,
    scratch_dir: PathBuf,
    session: Option<ModelSession>,
}

impl ScriptBackend {
    pub fn new(program: &str, base_args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            base_args,
            workdir: None,
            accelerated: false,
            scratch_dir: std::env::temp_dir().join("bubblebook-txt2img"),
            session: None,
        }
    }

    pub fn from_config(config: &ToolConfig) -> Result<Self> {
        let script = config.script();
        let program = script.program.as_deref().ok_or_else(|| {
            BookError::ConfigError(
                "Script backend needs [backends.script] program in .bubblebook/config.toml"
                    .to_string(),
            )
        })?;

        let mut backend = Self::new(program, script.args.clone());
        backend.workdir = script.workdir.as_ref().map(PathBuf::from);
        backend.accelerated = script.accelerated;
        Ok(backend)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(ref dir) = self.workdir {
            cmd.current_dir(dir);
        }
        cmd.args(&self.base_args);
        cmd
    }

    /// Program arguments for one request, excluding the base args
    pub fn request_args(&self, request: &Txt2ImgRequest, outfile: &std::path::Path) -> Vec<String> {
        let mut args = vec![
            "--prompt".to_string(),
            request.prompt.clone(),
            "--negative_prompt".to_string(),
            request.negative_prompt.clone(),
            format!("--width={}", request.width),
            format!("--height={}", request.height),
            format!("--steps={}", request.steps),
            format!("--cfg_scale={}", request.guidance_scale),
            format!("--sampler_name={}", request.sampler_name),
            format!("--seed={}", request.seed),
        ];
        if let Some(ref session) = self.session {
            args.push(format!("--ckpt={}", session.model));
            if session.low_memory {
                args.push("--low_memory".to_string());
            }
        }
        args.push(format!("--outfile={}", outfile.display()));
        args
    }
}

impl ImageBackend for ScriptBackend {
    fn name(&self) -> &str {
        "script"
    }

    fn health_check(&self) -> Result<BackendStatus> {
        match self.command().arg("--help").output() {
            Ok(output) if output.status.success() => Ok(BackendStatus::Available),
            Ok(output) => Ok(BackendStatus::Unavailable(format!(
                "{} exited with {}",
                self.program, output.status
            ))),
            Err(e) => Ok(BackendStatus::Unavailable(format!(
                "cannot run {}: {}",
                self.program, e
            ))),
        }
    }

    fn load_model(&mut self, model: &str) -> Result<ModelSession> {
        let path = match self.workdir {
            Some(ref dir) => dir.join(model),
            None => PathBuf::from(model),
        };
        let is_file = model.ends_with(".safetensors") || model.ends_with(".ckpt");
        if is_file && !path.exists() {
            return Err(BookError::BackendError(format!(
                "Checkpoint not found: {}",
                path.display()
            )));
        }

        let device = if self.accelerated {
            Device::Accelerated
        } else {
            Device::Cpu
        };
        let session = ModelSession {
            model: model.to_string(),
            device,
            sampler: MULTISTEP_SAMPLER.to_string(),
            low_memory: device == Device::Accelerated,
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Vec<u8>> {
        if self.session.is_none() {
            return Err(BookError::ModelNotLoaded);
        }

        std::fs::create_dir_all(&self.scratch_dir)?;
        let outfile = ScratchFile(
            self.scratch_dir
                .join(format!("{}.png", uuid::Uuid::new_v4())),
        );

        let mut cmd = self.command();
        cmd.args(self.request_args(request, &outfile.0));
        tracing::debug!(program = %self.program, "running txt2img");

        let status = cmd.status()?;
        if !status.success() {
            return Err(BookError::BackendError(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        let bytes = std::fs::read(&outfile.0).map_err(|e| {
            BookError::BackendError(format!(
                "{} did not write {}: {}",
                self.program,
                outfile.0.display(),
                e
            ))
        })?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Txt2ImgRequest {
        Txt2ImgRequest {
            prompt: "a bubble, soft watercolor".to_string(),
            negative_prompt: "dark".to_string(),
            width: 1024,
            height: 1024,
            steps: 50,
            guidance_scale: 7.5,
            sampler_name: MULTISTEP_SAMPLER.to_string(),
            seed: 7,
        }
    }

    #[test]
    fn test_request_args() {
        let mut backend = ScriptBackend::new("python", vec!["scripts/txt2img.py".to_string()]);
        backend.load_model("runwayml/stable-diffusion-v1-5").unwrap();

        let args = backend.request_args(&request(), std::path::Path::new("/tmp/out.png"));
        assert_eq!(args[0], "--prompt");
        assert_eq!(args[1], "a bubble, soft watercolor");
        assert!(args.contains(&"--seed=7".to_string()));
        assert!(args.contains(&"--sampler_name=DPM++ 2M".to_string()));
        assert!(args.contains(&"--ckpt=runwayml/stable-diffusion-v1-5".to_string()));
        assert!(!args.contains(&"--low_memory".to_string()));
        assert_eq!(args.last().unwrap(), "--outfile=/tmp/out.png");
    }

    #[test]
    fn test_missing_checkpoint_file() {
        let mut backend = ScriptBackend::new("python", vec![]);
        let result = backend.load_model("/nonexistent/dreamshaper_8.safetensors");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_requires_program() {
        let config = ToolConfig::default();
        assert!(ScriptBackend::from_config(&config).is_err());
    }

    #[test]
    fn test_unknown_program_is_unavailable() {
        let backend = ScriptBackend::new("bubblebook-no-such-program", vec![]);
        assert!(matches!(
            backend.health_check().unwrap(),
            BackendStatus::Unavailable(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_program_is_backend_error() {
        let mut backend = ScriptBackend::new("false", vec![]);
        backend.load_model("sd-v1-5").unwrap();
        assert!(matches!(
            backend.txt2img(&request()),
            Err(BookError::BackendError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_partial_output_removed_on_failure() {
        let script = r#"for a; do case $a in --outfile=*) f=${a#--outfile=};; esac; done; echo partial > "$f"; exit 1"#;
        let mut backend = ScriptBackend::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "txt2img".to_string()],
        );
        backend.scratch_dir = std::env::temp_dir().join(format!("bubblebook_script_test_{}", uuid::Uuid::new_v4()));
        backend.load_model("sd-v1-5").unwrap();

        assert!(matches!(
            backend.txt2img(&request()),
            Err(BookError::BackendError(_))
        ));
        let leftovers = std::fs::read_dir(&backend.scratch_dir).unwrap().count();
        assert_eq!(leftovers, 0);

        std::fs::remove_dir_all(&backend.scratch_dir).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_output_read_and_removed() {
        let script = r#"for a; do case $a in --outfile=*) f=${a#--outfile=};; esac; done; printf png > "$f""#;
        let mut backend = ScriptBackend::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "txt2img".to_string()],
        );
        backend.scratch_dir = std::env::temp_dir().join(format!("bubblebook_script_test_{}", uuid::Uuid::new_v4()));
        backend.load_model("sd-v1-5").unwrap();

        assert_eq!(backend.txt2img(&request()).unwrap(), b"png".to_vec());
        assert_eq!(std::fs::read_dir(&backend.scratch_dir).unwrap().count(), 0);

        std::fs::remove_dir_all(&backend.scratch_dir).ok();
    }
}
