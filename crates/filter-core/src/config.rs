use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PortConfig
// ---------------------------------------------------------------------------

/// First candidate host port per logical service, plus the scan limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    #[serde(default = "default_app_port")]
    pub app: u16,
    #[serde(default = "default_postgres_port")]
    pub postgres: u16,
    #[serde(default = "default_jupyter_port")]
    pub jupyter: u16,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u16,
}

fn default_app_port() -> u16 {
    8001
}

fn default_postgres_port() -> u16 {
    5433
}

fn default_jupyter_port() -> u16 {
    8888
}

fn default_max_attempts() -> u16 {
    100
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            app: default_app_port(),
            postgres: default_postgres_port(),
            jupyter: default_jupyter_port(),
            max_attempts: default_max_attempts(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_workspaces_dir")]
    pub workspaces_directory: String,
    #[serde(default = "default_projects_dir")]
    pub projects_directory: String,
    #[serde(default = "default_templates_dir")]
    pub templates_directory: String,
    #[serde(default = "default_kanban_dir")]
    pub kanban_directory: String,
    #[serde(default)]
    pub ports: PortConfig,
    /// Compose service that `workspace exec` and `workspace shell` attach to.
    #[serde(default = "default_exec_service")]
    pub exec_service: String,
}

fn default_version() -> u32 {
    1
}

fn default_workspaces_dir() -> String {
    paths::DEFAULT_WORKSPACES_DIR.to_string()
}

fn default_projects_dir() -> String {
    paths::DEFAULT_PROJECTS_DIR.to_string()
}

fn default_templates_dir() -> String {
    paths::REPO_TEMPLATES_DIR.to_string()
}

fn default_kanban_dir() -> String {
    paths::REPO_KANBAN_DIR.to_string()
}

fn default_exec_service() -> String {
    "app".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspaces_directory: default_workspaces_dir(),
            projects_directory: default_projects_dir(),
            templates_directory: default_templates_dir(),
            kanban_directory: default_kanban_dir(),
            ports: PortConfig::default(),
            exec_service: default_exec_service(),
        }
    }
}

impl Config {
    /// Load `.filter/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn workspaces_dir(&self, root: &Path) -> Result<PathBuf> {
        paths::resolve_dir(root, &self.workspaces_directory)
    }

    pub fn projects_dir(&self, root: &Path) -> Result<PathBuf> {
        paths::resolve_dir(root, &self.projects_directory)
    }

    pub fn templates_dir(&self, root: &Path) -> Result<PathBuf> {
        paths::resolve_dir(root, &self.templates_directory)
    }

    pub fn kanban_dir(&self, root: &Path) -> Result<PathBuf> {
        paths::resolve_dir(root, &self.kanban_directory)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, root: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        match self.templates_dir(root) {
            Ok(dir) if !dir.is_dir() => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "templates_directory '{}' does not exist (run 'filter init')",
                    dir.display()
                ),
            }),
            Ok(_) => {}
            Err(e) => warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("templates_directory: {e}"),
            }),
        }

        let mut starts: HashMap<u16, &str> = HashMap::new();
        for (name, port) in [
            ("app", self.ports.app),
            ("postgres", self.ports.postgres),
            ("jupyter", self.ports.jupyter),
        ] {
            if port == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("ports.{name} must be non-zero"),
                });
                continue;
            }
            if let Some(other) = starts.insert(port, name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "ports.{name} and ports.{other} share start port {port}; allocation will scan past it"
                    ),
                });
            }
        }

        if self.ports.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "ports.max_attempts must be at least 1".to_string(),
            });
        }

        if self.exec_service.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "exec_service is empty; 'workspace exec' will fail".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.workspaces_directory, "workspaces");
        assert_eq!(cfg.ports.postgres, 5433);
        assert_eq!(cfg.ports.app, 8001);
        assert_eq!(
            cfg.workspaces_dir(dir.path()).unwrap(),
            dir.path().join("workspaces")
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".filter")).unwrap();
        std::fs::write(
            dir.path().join(".filter/config.yaml"),
            "workspaces_directory: /srv/ws\nports:\n  app: 9001\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.workspaces_dir(dir.path()).unwrap(), PathBuf::from("/srv/ws"));
        assert_eq!(cfg.ports.app, 9001);
        assert_eq!(cfg.ports.postgres, 5433);
        assert_eq!(cfg.projects_directory, "projects");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.exec_service = "dev".to_string();
        cfg.save(dir.path()).unwrap();
        let back = Config::load(dir.path()).unwrap();
        assert_eq!(back.exec_service, "dev");
    }

    #[test]
    fn validate_flags_missing_templates_dir() {
        let dir = TempDir::new().unwrap();
        let warnings = Config::default().validate(dir.path());
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("templates_directory")));
    }

    #[test]
    fn validate_flags_shared_start_port() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".filter/templates")).unwrap();
        let mut cfg = Config::default();
        cfg.ports.jupyter = cfg.ports.app;
        let warnings = cfg.validate(dir.path());
        assert!(warnings.iter().any(|w| w.message.contains("share start port")));
    }

    #[test]
    fn validate_clean_config_has_no_warnings() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".filter/templates")).unwrap();
        assert!(Config::default().validate(dir.path()).is_empty());
    }
}
