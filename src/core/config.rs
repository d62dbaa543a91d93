use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable consulted when `registry.password` is not set.
pub const REGISTRY_PASSWORD_ENV: &str = "DOCKHAND_REGISTRY_PASSWORD";

/// Which container-management engine a stack targets. Fixed for the
/// process lifetime once the configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Swarm,
    Compose,
}

impl DeploymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Swarm => "swarm",
            DeploymentMode::Compose => "compose",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dockhand.yaml configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stack: String,
    pub mode: DeploymentMode,
    pub ssh: SshConfig,
    pub registry: Registry,
    pub secrets: Vec<String>,
    pub accessories: Vec<String>,
    pub compose_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::new(),
            port: 22,
            key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stack: String::new(),
            mode: DeploymentMode::Swarm,
            ssh: SshConfig::default(),
            registry: Registry::default(),
            secrets: Vec::new(),
            accessories: Vec::new(),
            compose_file: "docker-compose.yaml".to_string(),
        }
    }
}

/// Read and parse a dockhand.yaml configuration file.
///
/// Key paths get tilde expansion, the compose file path is resolved
/// relative to the config file, and the registry password falls back to
/// the `DOCKHAND_REGISTRY_PASSWORD` environment variable.
pub fn load(path: &str) -> Result<Config> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file {}: {}", path, e)))?;

    let mut cfg: Config = serde_yml::from_str(&data)?;

    if !cfg.ssh.key.is_empty() {
        cfg.ssh.key = shellexpand::tilde(&cfg.ssh.key).to_string();
    }

    if !cfg.compose_file.is_empty() && !Path::new(&cfg.compose_file).is_absolute() {
        if let Some(dir) = Path::new(path).parent() {
            cfg.compose_file = dir.join(&cfg.compose_file).to_string_lossy().to_string();
        }
    }

    if cfg.registry.password.is_empty() {
        if let Ok(password) = std::env::var(REGISTRY_PASSWORD_ENV) {
            cfg.registry.password = password;
        }
    }

    Ok(cfg)
}

/// Read the declarative stack content (compose file) as raw bytes.
pub fn load_compose_file(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| Error::Config(format!("failed to read compose file {}: {}", path, e)))
}

impl Config {
    /// Check the configuration, collecting every problem before failing.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.stack.is_empty() {
            problems.push("stack name is required".to_string());
        }

        // SSH is optional - if host is provided, user is required
        if !self.ssh.host.is_empty() {
            if self.ssh.user.is_empty() {
                problems.push("ssh.user is required when ssh.host is set".to_string());
            }
            if self.ssh.port == 0 {
                problems.push("ssh.port must be between 1 and 65535".to_string());
            }
            if !self.ssh.key.is_empty() && !Path::new(&self.ssh.key).exists() {
                problems.push(format!("SSH key file not found: {}", self.ssh.key));
            }
        }

        if !self.compose_file.is_empty() && !Path::new(&self.compose_file).exists() {
            problems.push(format!("compose file not found: {}", self.compose_file));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "validation failed:\n  - {}",
                problems.join("\n  - ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> String {
        let path = dir.path().join("dockhand.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn load_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "stack: myapp\n");

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.stack, "myapp");
        assert_eq!(cfg.mode, DeploymentMode::Swarm);
        assert_eq!(cfg.ssh.port, 22);
        assert!(cfg.compose_file.ends_with("docker-compose.yaml"));
    }

    #[test]
    fn load_parses_compose_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "stack: myapp\nmode: compose\n");

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.mode, DeploymentMode::Compose);
    }

    #[test]
    fn load_resolves_compose_file_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "stack: myapp\ncompose_file: stack.yaml\n");

        let cfg = load(&path).unwrap();
        assert_eq!(
            cfg.compose_file,
            dir.path().join("stack.yaml").to_string_lossy()
        );
    }

    #[test]
    fn validate_requires_stack_name() {
        let cfg = Config::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("stack name is required"));
    }

    #[test]
    fn validate_requires_user_with_host() {
        let dir = tempfile::tempdir().unwrap();
        let compose = dir.path().join("docker-compose.yaml");
        std::fs::write(&compose, "services:\n").unwrap();

        let cfg = Config {
            stack: "myapp".to_string(),
            ssh: SshConfig {
                host: "deploy.example.com".to_string(),
                ..SshConfig::default()
            },
            compose_file: compose.to_string_lossy().to_string(),
            ..Config::default()
        };

        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("ssh.user is required"));
    }

    #[test]
    fn validate_collects_multiple_problems() {
        let cfg = Config {
            compose_file: "/nonexistent/compose.yaml".to_string(),
            ..Config::default()
        };

        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("stack name is required"));
        assert!(err.contains("compose file not found"));
    }

    #[test]
    fn registry_password_falls_back_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "stack: myapp\nregistry:\n  url: ghcr.io\n");

        std::env::set_var(REGISTRY_PASSWORD_ENV, "hunter2");
        let cfg = load(&path).unwrap();
        std::env::remove_var(REGISTRY_PASSWORD_ENV);

        assert_eq!(cfg.registry.password, "hunter2");
    }
}
