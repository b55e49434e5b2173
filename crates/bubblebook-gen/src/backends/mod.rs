//! Backend registry
//!
//! Maps backend names to concrete implementations.

pub mod mock;
pub mod script;
pub mod webui;

use crate::backend::ImageBackend;
use crate::config::ToolConfig;
use bubblebook_core::{BookError, Result};

/// Create a backend by name with configuration
pub fn create_backend(name: &str, config: &ToolConfig) -> Result<Box<dyn ImageBackend>> {
    match name {
        "mock" => Ok(Box::new(mock::MockBackend::new())),
        "webui" => Ok(Box::new(webui::WebUiBackend::from_config(config)?)),
        "script" => Ok(Box::new(script::ScriptBackend::from_config(config)?)),
        _ => Err(BookError::ConfigError(format!(
            "Unknown backend '{}'. Available: {}",
            name,
            available_backends().join(", ")
        ))),
    }
}

/// List all available backend names
pub fn available_backends() -> Vec<&'static str> {
    vec!["webui", "script", "mock"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_known_backends() {
        let config = ToolConfig::default();
        assert_eq!(create_backend("mock", &config).unwrap().name(), "mock");
        assert_eq!(create_backend("webui", &config).unwrap().name(), "webui");
    }

    #[test]
    fn test_unknown_backend() {
        let err = create_backend("dall-e", &ToolConfig::default()).err().unwrap();
        assert!(err.to_string().contains("webui, script, mock"));
    }
}
