//! Configuration loading, version migration and saving

use std::path::Path;

use serde_json::Value;

use crate::error::{SimError, SimResult};
use crate::model::spec::SUPPORTED_VERSION;
use crate::model::ModelSpec;

/// Load and validate model specs from YAML/JSON files or in-memory values
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a model from a `.yaml`/`.yml` or `.json` file
    pub fn load(&self, path: impl AsRef<Path>) -> SimResult<ModelSpec> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|_| SimError::Io(format!("config file not found: {}", path.display())))?;
        let value: Value = if is_yaml(path) {
            serde_yaml::from_str(&text).map_err(|e| SimError::Format(e.to_string()))?
        } else {
            serde_json::from_str(&text).map_err(|e| SimError::Format(e.to_string()))?
        };
        self.load_value(value)
    }

    /// Validate an in-memory JSON value into a model
    pub fn load_value(&self, payload: Value) -> SimResult<ModelSpec> {
        let normalized = self.normalize_version(payload)?;
        let mut spec: ModelSpec =
            serde_json::from_value(normalized).map_err(|e| SimError::Format(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Write a model back out; the format follows the file extension
    pub fn save(&self, spec: &ModelSpec, path: impl AsRef<Path>) -> SimResult<()> {
        let path = path.as_ref();
        let text = if is_yaml(path) {
            serde_yaml::to_string(spec).map_err(|e| SimError::Format(e.to_string()))?
        } else {
            let mut rendered = serde_json::to_string_pretty(spec)
                .map_err(|e| SimError::Format(e.to_string()))?;
            rendered.push('\n');
            rendered
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Migrate legacy "0.1" payloads; missing fields pick up serde defaults
    fn normalize_version(&self, payload: Value) -> SimResult<Value> {
        let mut root = match payload {
            Value::Object(root) => root,
            _ => return Err(SimError::Format("config root must be object".to_string())),
        };
        let version = root
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("0.1")
            .to_string();
        if version == SUPPORTED_VERSION {
            return Ok(Value::Object(root));
        }
        if version == "0.1" {
            root.insert("version".to_string(), Value::String(SUPPORTED_VERSION.to_string()));
            return Ok(Value::Object(root));
        }
        Err(SimError::validation(
            "version",
            format!("unsupported config version '{version}'"),
        ))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}
