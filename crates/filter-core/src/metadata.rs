use crate::error::{FilterError, Result};
use crate::{paths, project};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identity of a repository initialized with `filter init`, stored in
/// `.filter/metadata.yaml`. The prefix seeds story ids on the repository
/// board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub project_name: String,
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl RepoMetadata {
    /// Metadata for `project_name`, generating the prefix unless one is given.
    pub fn new(project_name: &str, prefix: Option<&str>) -> Result<Self> {
        paths::validate_name("project name", project_name)?;
        let prefix = match prefix {
            Some(p) => {
                paths::validate_name("prefix", p)?;
                p.to_string()
            }
            None => project::generate_prefix(project_name),
        };
        Ok(Self {
            project_name: project_name.to_string(),
            prefix,
            git_url: None,
            created_at: Utc::now(),
            version: default_version(),
        })
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::metadata_path(root);
        if !path.exists() {
            return Err(FilterError::not_found(
                "repository metadata",
                path.display().to_string(),
            ));
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::metadata_path(root), data.as_bytes())
    }
}

/// Whether `root` has been set up with `filter init`.
pub fn is_initialized(root: &Path) -> bool {
    paths::metadata_path(root).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generated_prefix() {
        let meta = RepoMetadata::new("order-router", None).unwrap();
        assert_eq!(meta.prefix, "orrod");
    }

    #[test]
    fn explicit_prefix_is_validated() {
        assert_eq!(RepoMetadata::new("x", Some("ord")).unwrap().prefix, "ord");
        assert!(matches!(
            RepoMetadata::new("x", Some("o r")),
            Err(FilterError::InvalidName { field: "prefix", .. })
        ));
    }

    #[test]
    fn save_load() {
        let dir = TempDir::new().unwrap();
        assert!(!is_initialized(dir.path()));
        RepoMetadata::new("demo", None).unwrap().save(dir.path()).unwrap();
        assert!(is_initialized(dir.path()));
        assert_eq!(RepoMetadata::load(dir.path()).unwrap().project_name, "demo");
    }
}
