//! Configuration loader with multi-source merging.

use crate::{ConfigError, NodewardenConfig, Paths};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with a builder pattern, matching the teacher's
/// `ConfigLoader` idiom.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Creates a new config loader rooted at the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "NODEWARDEN".to_string(),
        }
    }

    /// Sets the project directory to load `nodewarden.toml`/`nodewarden.local.toml` from.
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the environment variable prefix (default: `NODEWARDEN`).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads configuration from all sources with proper precedence.
    pub fn load(self) -> Result<NodewardenConfig, ConfigError> {
        let mut builder = config::Config::builder();

        let defaults = NodewardenConfig::default();
        builder = builder.add_source(
            config::Config::try_from(&defaults).map_err(|e| ConfigError::MergeError(e.to_string()))?,
        );

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| ConfigError::MergeError(e.to_string()))?;

        let parsed: NodewardenConfig = built
            .try_deserialize()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        // Validate the address eagerly so a malformed value is caught at
        // load time rather than on first use by the coordinator.
        parsed.server.parse_address()?;

        Ok(parsed)
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load_or_default(self) -> NodewardenConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_defaults() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("failed to load config");

        assert_eq!(config.ha.failover_delay_secs, 60);
        assert!(config.is_standalone());
    }

    #[test]
    fn load_project_config() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("nodewarden.toml"),
            r#"
[node]
name = "node-a"

[server]
address = "10.0.0.5:10051"

[ha]
failover_delay_secs = 30
"#,
        )
        .expect("failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.node.name, "node-a");
        assert_eq!(config.server.address, "10.0.0.5:10051");
        assert_eq!(config.ha.failover_delay_secs, 30);
        assert!(!config.is_standalone());
    }

    #[test]
    fn local_overrides_project() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("nodewarden.toml"),
            "[node]\nname = \"node-a\"\n",
        )
        .expect("failed to write project config");

        fs::write(
            project_dir.join("nodewarden.local.toml"),
            "[node]\nname = \"node-a-local\"\n",
        )
        .expect("failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("failed to load config");

        assert_eq!(config.node.name, "node-a-local");
    }

    #[test]
    fn rejects_malformed_address_at_load_time() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("nodewarden.toml"),
            "[server]\naddress = \"host:not-a-port\"\n",
        )
        .expect("failed to write config");

        let result = ConfigLoader::new().with_project_dir(project_dir).load();
        assert!(matches!(result, Err(ConfigError::InvalidAddress(_))));
    }

    // Environment variable precedence (NODEWARDEN_NODE_NAME, etc.) is
    // exercised in integration rather than unit tests, since the `config`
    // crate reads `std::env` globally and unit tests run concurrently.
}
