// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading.
//!
//! The config is a small YAML document, by default `config.yaml` in the
//! working directory:
//!
//! ```yaml
//! civitai:
//!   token: "0123456789abcdef"
//! comfyui:
//!   base_model_path: "/opt/ComfyUI/models"
//! ```
//!
//! `civitai.api_base` may point the registry client at a mirror.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FetchError, Result};
use crate::registry::DEFAULT_API_BASE;
use crate::utils::mask_sensitive;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub civitai: CivitaiConfig,
    #[serde(default)]
    pub comfyui: ComfyUiConfig,
}

/// Registry access settings.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CivitaiConfig {
    /// API token appended to download URLs.
    #[serde(default)]
    pub token: String,
    /// Model-version endpoint; the public API when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl fmt::Debug for CivitaiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CivitaiConfig")
            .field("token", &mask_sensitive(&self.token, 4))
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Output location settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfyUiConfig {
    /// Root of the ComfyUI `models` tree.
    #[serde(default)]
    pub base_model_path: String,
}

impl Config {
    /// Read, parse and validate the config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| FetchError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
            .map_err(|e| match e {
                FetchError::Config(msg) => FetchError::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            })
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| FetchError::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// A token is mandatory; everything else has a default.
    pub fn validate(&self) -> Result<()> {
        if self.civitai.token.trim().is_empty() {
            return Err(FetchError::Config("civitai.token is not set".to_string()));
        }
        Ok(())
    }

    pub fn token(&self) -> &str {
        self.civitai.token.trim()
    }

    /// Registry endpoint, defaulting to the public Civitai API.
    pub fn api_base(&self) -> &str {
        self.civitai
            .api_base
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE)
    }

    /// Root directory for downloads, the working directory when unset.
    pub fn base_model_path(&self) -> PathBuf {
        let path = self.comfyui.base_model_path.trim();
        if path.is_empty() {
            warn!("comfyui.base_model_path not set, using current directory");
            PathBuf::from(".")
        } else {
            PathBuf::from(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(
            "civitai:\n  token: abc123\ncomfyui:\n  base_model_path: /opt/ComfyUI/models\n",
        )
        .unwrap();
        assert_eq!(config.token(), "abc123");
        assert_eq!(config.base_model_path(), PathBuf::from("/opt/ComfyUI/models"));
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_missing_base_path_defaults_to_cwd() {
        let config = Config::from_yaml("civitai:\n  token: abc123\n").unwrap();
        assert_eq!(config.base_model_path(), PathBuf::from("."));
    }

    #[test]
    fn test_api_base_override() {
        let config = Config::from_yaml(
            "civitai:\n  token: abc\n  api_base: http://127.0.0.1:8080/api/v1/model-versions/\n",
        )
        .unwrap();
        assert_eq!(config.api_base(), "http://127.0.0.1:8080/api/v1/model-versions/");
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = Config::from_yaml("civitai:\n  token: \"\"\n").unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));

        let err = Config::from_yaml("comfyui:\n  base_model_path: /tmp\n").unwrap_err();
        assert!(err.to_string().contains("civitai.token"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = Config::from_yaml("civitai: [token").unwrap_err();
        assert!(matches!(err, FetchError::Config(msg) if msg.contains("invalid YAML")));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("config.yaml")).unwrap_err();
        assert!(matches!(err, FetchError::Config(msg) if msg.contains("cannot read")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "civitai:\n  token: fromfile").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.token(), "fromfile");
    }

    #[test]
    fn test_debug_masks_token() {
        let config = Config::from_yaml("civitai:\n  token: verysecrettoken\n").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("verysecrettoken"));
        assert!(debug.contains("very..."));
    }
}
