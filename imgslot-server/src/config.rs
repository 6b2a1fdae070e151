use imgslot_core::{ImgSlotError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Bearer secret for uploads. Falls back to the `API_KEY` environment
    /// variable, then to the insecure development key.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub placeholder: PlaceholderConfig,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,
    #[serde(default = "default_placeholder_path")]
    pub placeholder_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    #[serde(default = "default_placeholder_enabled")]
    pub enabled: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_image_path() -> PathBuf {
    PathBuf::from("stored_image.png")
}

fn default_placeholder_path() -> PathBuf {
    PathBuf::from("default_no_image.png")
}

fn default_placeholder_enabled() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            api_key: None,
            storage: StorageConfig::default(),
            placeholder: PlaceholderConfig::default(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            placeholder_path: default_placeholder_path(),
        }
    }
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: default_placeholder_enabled(),
        }
    }
}

impl Config {
    /// Load settings from an optional YAML file overlaid with `IMGSLOT_*`
    /// environment variables (`__` separates nested keys).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("IMGSLOT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ImgSlotError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| ImgSlotError::Config(e.to_string()))?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("API_KEY").ok();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgslot.yaml");
        std::fs::write(
            &path,
            "bind_addr: 127.0.0.1:9000\n\
             api_key: from-file\n\
             storage:\n  image_path: /var/lib/imgslot/current.png\n\
             placeholder:\n  enabled: false\n",
        )
        .unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(
            config.storage.image_path,
            PathBuf::from("/var/lib/imgslot/current.png")
        );
        assert_eq!(
            config.storage.placeholder_path,
            PathBuf::from("default_no_image.png")
        );
        assert!(!config.placeholder.enabled);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let result = Config::load(Some(path.to_str().unwrap()));
        assert!(matches!(result, Err(ImgSlotError::Config(_))));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.storage.image_path, PathBuf::from("stored_image.png"));
        assert!(config.placeholder.enabled);
        assert!(config.api_key.is_none());
    }
}
