use crate::error::{FilterError, Result};
use crate::{kanban, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PREFIX_LEN: usize = 5;

/// Derive a short story-id prefix from a project name.
///
/// The name is lowercased and stripped to ASCII alphanumerics. Names that fit
/// are used as-is. Multi-word names take the leading letters of each word and
/// are padded with unused letters from the cleaned name; single words are
/// truncated.
pub fn generate_prefix(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let clean: String = lower.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if clean.len() <= PREFIX_LEN {
        return clean;
    }

    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() <= 1 {
        return clean[..PREFIX_LEN].to_string();
    }

    let per_word = (PREFIX_LEN / words.len()).max(1);
    let mut prefix: String = words
        .iter()
        .flat_map(|w| w.chars().take(per_word))
        .take(PREFIX_LEN)
        .collect();
    for c in clean.chars() {
        if prefix.len() >= PREFIX_LEN {
            break;
        }
        if !prefix.contains(c) {
            prefix.push(c);
        }
    }
    prefix
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub prefix: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Options for [`Project::create`].
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub description: String,
    pub git_url: Option<String>,
    pub maintainers: Vec<String>,
    /// Board copied into the new project. `None` skips the board entirely;
    /// a path that does not exist yields an empty board.
    pub kanban_seed: Option<PathBuf>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prefix: generate_prefix(&name),
            name,
            description: String::new(),
            git_url: None,
            maintainers: Vec::new(),
            created_at: Utc::now(),
            version: default_version(),
        }
    }

    pub fn dir(&self, projects_dir: &Path) -> PathBuf {
        paths::project_dir(projects_dir, &self.name)
    }

    pub fn kanban_dir(&self, projects_dir: &Path) -> PathBuf {
        paths::project_kanban_dir(projects_dir, &self.name)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn create(projects_dir: &Path, name: &str, opts: NewProject) -> Result<Self> {
        paths::validate_name("project name", name)?;
        let dir = paths::project_dir(projects_dir, name);
        if dir.exists() {
            return Err(FilterError::already_exists("project", dir));
        }

        let mut project = Self::new(name);
        project.description = opts.description;
        project.git_url = opts.git_url.filter(|u| !u.is_empty());
        project.maintainers = opts.maintainers;

        crate::io::ensure_dir(&dir)?;
        project.save(projects_dir)?;

        if let Some(seed) = opts.kanban_seed {
            let board = project.kanban_dir(projects_dir);
            if seed.is_dir() {
                crate::io::copy_dir_all(&seed, &board)?;
            }
            kanban::create_structure(&board)?;
        }

        tracing::info!(project = name, prefix = %project.prefix, "created project");
        Ok(project)
    }

    pub fn load(projects_dir: &Path, name: &str) -> Result<Self> {
        let manifest = paths::project_manifest(projects_dir, name);
        if !manifest.exists() {
            return Err(FilterError::not_found("project", name));
        }
        let data = std::fs::read_to_string(&manifest)?;
        let project: Project =
            serde_yaml::from_str(&data).map_err(FilterError::manifest(&manifest))?;
        Ok(project)
    }

    pub fn save(&self, projects_dir: &Path) -> Result<()> {
        let manifest = paths::project_manifest(projects_dir, &self.name);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&manifest, data.as_bytes())
    }

    /// Projects under `projects_dir`, sorted by name. Hidden directories and
    /// directories without a `project.yaml` are skipped.
    pub fn list(projects_dir: &Path) -> Result<Vec<Self>> {
        if !projects_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut projects = Vec::new();
        for entry in std::fs::read_dir(projects_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            match Self::load(projects_dir, &name) {
                Ok(p) => projects.push(p),
                Err(FilterError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    pub fn delete(projects_dir: &Path, name: &str) -> Result<()> {
        paths::validate_name("project name", name)?;
        let dir = paths::project_dir(projects_dir, name);
        if !dir.is_dir() {
            return Err(FilterError::not_found("project", name));
        }
        std::fs::remove_dir_all(&dir)?;
        tracing::info!(project = name, "deleted project");
        Ok(())
    }
}
