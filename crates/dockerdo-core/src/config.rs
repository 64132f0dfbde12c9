//! User configuration for dockerdo.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// User configuration loaded from `~/.config/dockerdo/dockerdo.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Remote host used when `init` is given neither `--remote` nor `--local`
    pub default_remote_host: Option<String>,
    /// Base image used when `init` is given no `--image`
    pub default_image: String,
    /// Registry used when `init` is given no `--registry`
    pub default_docker_registry: Option<String>,
    /// Extra `docker run` arguments added by `run`
    pub default_docker_run_args: Option<String>,
    /// Record filesystem events by default
    pub record_inotify: bool,
    /// Public key baked into the image by `build`
    pub ssh_key_path: PathBuf,
    /// Log level (trace, debug, info, warn, error, off)
    pub log_level: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default_remote_host: None,
            default_image: "ubuntu:latest".to_string(),
            default_docker_registry: None,
            default_docker_run_args: None,
            record_inotify: false,
            ssh_key_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(".ssh")
                .join("id_rsa.pub"),
            log_level: "warn".to_string(),
        }
    }
}

impl UserConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the user configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        // An empty file is a valid, all-defaults config.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: UserConfig = serde_yaml::from_str(yaml)
            .map_err(|e| crate::Error::Config(format!("invalid user config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.default_image.trim().is_empty() {
            return Err(crate::Error::Config(
                "default_image cannot be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(crate::Error::Config(format!(
                "unknown log_level '{}' (expected one of: {})",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        for (field, value) in [
            ("default_remote_host", &self.default_remote_host),
            ("default_docker_registry", &self.default_docker_registry),
            ("default_docker_run_args", &self.default_docker_run_args),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(crate::Error::Config(format!("{field} cannot be blank")));
            }
        }

        Ok(())
    }
}

/// Directory holding the user configuration.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("dockerdo")
}

/// Path of the user configuration file.
pub fn user_config_path() -> PathBuf {
    user_config_dir().join("dockerdo.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UserConfig::default();
        assert_eq!(config.default_image, "ubuntu:latest");
        assert_eq!(config.default_remote_host, None);
        assert_eq!(config.log_level, "warn");
        assert!(!config.record_inotify);
        assert!(config.ssh_key_path.ends_with(".ssh/id_rsa.pub"));
    }

    #[test]
    fn test_config_validation() {
        let config = UserConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
default_remote_host: gpu01
default_image: alpine:3.20
default_docker_registry: harbor.local
default_docker_run_args: "--gpus all"
record_inotify: true
ssh_key_path: /home/me/.ssh/id_ed25519.pub
log_level: debug
"#;

        let config = UserConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.default_remote_host.as_deref(), Some("gpu01"));
        assert_eq!(config.default_image, "alpine:3.20");
        assert_eq!(config.default_docker_registry.as_deref(), Some("harbor.local"));
        assert_eq!(config.default_docker_run_args.as_deref(), Some("--gpus all"));
        assert!(config.record_inotify);
        assert_eq!(
            config.ssh_key_path,
            PathBuf::from("/home/me/.ssh/id_ed25519.pub")
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = UserConfig::from_yaml("default_remote_host: gpu01\n").unwrap();
        assert_eq!(config.default_remote_host.as_deref(), Some("gpu01"));
        assert_eq!(config.default_image, "ubuntu:latest");
    }

    #[test]
    fn test_empty_yaml() {
        let config = UserConfig::from_yaml("").unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn test_invalid_log_level() {
        let result = UserConfig::from_yaml("log_level: chatty\n");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_empty_default_image() {
        let mut config = UserConfig::default();
        config.default_image = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_remote_host() {
        let mut config = UserConfig::default();
        config.default_remote_host = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let result = UserConfig::from_yaml("default_image: [unclosed");
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = UserConfig {
            default_remote_host: Some("gpu01".to_string()),
            ..Default::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert_eq!(UserConfig::from_yaml(&yaml).unwrap(), config);
    }
}
