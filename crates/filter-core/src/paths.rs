use crate::error::{FilterError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FILTER_DIR: &str = ".filter";
pub const CONFIG_FILE: &str = ".filter/config.yaml";
pub const METADATA_FILE: &str = ".filter/metadata.yaml";
pub const REPO_KANBAN_DIR: &str = ".filter/kanban";
pub const REPO_TEMPLATES_DIR: &str = ".filter/templates";

pub const DEFAULT_WORKSPACES_DIR: &str = "workspaces";
pub const DEFAULT_PROJECTS_DIR: &str = "projects";

pub const PROJECT_FILE: &str = "project.yaml";
pub const KANBAN_DIR: &str = "kanban";

pub const WORKSPACE_MANIFEST: &str = "workspace.yaml";
pub const WORKSPACE_SUBDIR: &str = "workspace";
pub const REPO_SUBDIR: &str = "repo";
pub const DOCKERFILE: &str = "Dockerfile";
pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const ENV_FILE: &str = ".env";

pub const TEMPLATE_META: &str = "template.yaml";
pub const DOCKERFILE_TEMPLATE: &str = "Dockerfile.j2";
pub const COMPOSE_TEMPLATE: &str = "docker-compose.yml.j2";
pub const ENV_TEMPLATE: &str = "env.j2";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn metadata_path(root: &Path) -> PathBuf {
    root.join(METADATA_FILE)
}

pub fn filter_dir(root: &Path) -> PathBuf {
    root.join(FILTER_DIR)
}

pub fn workspace_dir(base_dir: &Path, name: &str) -> PathBuf {
    base_dir.join(name)
}

/// The inner directory mounted into the container (`{ws}/workspace`).
pub fn workspace_inner_dir(ws_root: &Path) -> PathBuf {
    ws_root.join(WORKSPACE_SUBDIR)
}

pub fn workspace_repo_dir(ws_root: &Path) -> PathBuf {
    workspace_inner_dir(ws_root).join(REPO_SUBDIR)
}

pub fn workspace_kanban_dir(ws_root: &Path) -> PathBuf {
    workspace_inner_dir(ws_root).join(KANBAN_DIR)
}

pub fn workspace_manifest(ws_root: &Path) -> PathBuf {
    ws_root.join(WORKSPACE_MANIFEST)
}

pub fn compose_path(ws_root: &Path) -> PathBuf {
    ws_root.join(COMPOSE_FILE)
}

pub fn project_dir(projects_dir: &Path, name: &str) -> PathBuf {
    projects_dir.join(name)
}

pub fn project_manifest(projects_dir: &Path, name: &str) -> PathBuf {
    project_dir(projects_dir, name).join(PROJECT_FILE)
}

pub fn project_kanban_dir(projects_dir: &Path, name: &str) -> PathBuf {
    project_dir(projects_dir, name).join(KANBAN_DIR)
}

pub fn template_dir(templates_dir: &Path, name: &str) -> PathBuf {
    templates_dir.join(name)
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

pub const MAX_NAME_LEN: usize = 100;

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").unwrap())
}

/// Validate a user-supplied identifier (workspace, project, story, suffix).
///
/// Allowed: ASCII alphanumerics, `-` and `_`, starting with an alphanumeric,
/// at most 100 characters.
pub fn validate_name(field: &'static str, value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        "cannot be empty"
    } else if value.len() > MAX_NAME_LEN {
        "cannot exceed 100 characters"
    } else if !name_re().is_match(value) {
        if value.starts_with(['-', '_']) {
            "must start with an alphanumeric character"
        } else {
            "must contain only alphanumeric characters, hyphens, and underscores"
        }
    } else {
        return Ok(());
    };
    Err(FilterError::InvalidName {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

/// Resolve a configured directory against `root`, expanding a leading `~/`.
pub fn resolve_dir(root: &Path, configured: &str) -> Result<PathBuf> {
    if let Some(rest) = configured.strip_prefix("~/") {
        let home = home::home_dir().ok_or(FilterError::HomeNotFound)?;
        return Ok(home.join(rest));
    }
    let p = Path::new(configured);
    if p.is_absolute() {
        Ok(p.to_path_buf())
    } else {
        Ok(root.join(p))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
