//! YAML configuration files for the agent and the publisher.
//!
//! The agent file doubles as the durable home of `current_version`, so
//! `YamlAgentConfigStore` also implements the `AgentStateStore` port.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};

use crate::application::ports::AgentStateStore;
use crate::domain::{AgentConfig, ConfigError, PublisherConfig};

/// Overrides the agent config location.
pub const AGENT_CONFIG_ENV: &str = "IRIS_UPDATE_CONFIG";

/// Publisher config location when `--config` is not given.
pub const PUBLISH_CONFIG_ENV: &str = "IRIS_UPDATE_PUBLISH_CONFIG";

/// Agent configuration stored in a YAML file on disk.
pub struct YamlAgentConfigStore {
    path: PathBuf,
}

impl YamlAgentConfigStore {
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolve the config path: explicit flag, then `$IRIS_UPDATE_CONFIG`,
    /// then `~/.iris-update/agent.yaml`.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the home directory cannot
    /// be determined.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::with_path(path));
        }
        if let Ok(val) = std::env::var(AGENT_CONFIG_ENV) {
            return Ok(Self::with_path(PathBuf::from(val)));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".iris-update").join("agent.yaml")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the agent config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unparsable, or holds
    /// an invalid value.
    pub fn load(&self) -> Result<AgentConfig, ConfigError> {
        let content = read_config(&self.path)?;
        let config: AgentConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rewrite only `current_version`, leaving every other key as written.
    fn persist_sync(path: &Path, version: u64) -> Result<()> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut doc: Mapping = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        doc.insert(
            Value::String("current_version".to_string()),
            Value::Number(version.into()),
        );
        let content = serde_yaml::to_string(&doc).context("serializing config")?;

        let temp_path = path.with_extension("yaml.tmp");
        write_synced(&temp_path, content.as_bytes())?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("finalizing {}", path.display()))?;
        Ok(())
    }
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(content)
        .with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }

    file.sync_all()
        .with_context(|| format!("syncing {}", path.display()))
}

impl AgentStateStore for YamlAgentConfigStore {
    async fn persist_current_version(&self, version: u64) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::persist_sync(&path, version))
            .await
            .context("config save task panicked")?
    }
}

/// Load the publisher config from `explicit`, `$IRIS_UPDATE_PUBLISH_CONFIG`,
/// or defaults when neither is set.
///
/// # Errors
///
/// Returns [`ConfigError`] if a named file is missing or unparsable.
pub fn load_publisher_config(explicit: Option<&Path>) -> Result<PublisherConfig, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match std::env::var(PUBLISH_CONFIG_ENV) {
            Ok(val) => PathBuf::from(val),
            Err(_) => return Ok(PublisherConfig::default()),
        },
    };
    let content = read_config(&path)?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
        path,
        reason: e.to_string(),
    })
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
