//! Workspace construction and lifecycle.
//!
//! A workspace is a directory under the configured base directory holding a
//! rendered `Dockerfile`, `docker-compose.yml` and a `workspace.yaml`
//! manifest, plus an inner `workspace/` directory that is mounted into the
//! container. Its state is never stored: it is derived from directory
//! presence and `docker compose ps -q` each time it is asked for.

use crate::config::PortConfig;
use crate::error::{FilterError, Result};
use crate::process::CommandRunner;
use crate::story::StoryRef;
use crate::template::{self, Context, Template};
use crate::{docker, git, paths, ports};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

const PASSWORD_LEN: usize = 24;
const DB_USER: &str = "filter";
const DB_NAME: &str = "filter";
const FAILED_START_LOG_LINES: usize = 50;

// ---------------------------------------------------------------------------
// WorkspaceState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceState {
    /// Built, never started.
    Created,
    Running,
    /// Started at least once, no live containers now.
    Stopped,
    Deleted,
}

impl fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkspaceState::Created => "created",
            WorkspaceState::Running => "running",
            WorkspaceState::Stopped => "stopped",
            WorkspaceState::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Build parameters
// ---------------------------------------------------------------------------

/// Where a workspace's `kanban/` directory comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KanbanSource {
    /// The repository's own board; symlinked so edits land in the repo.
    Repository(PathBuf),
    /// A project board shared between workspaces; copied.
    Shared(PathBuf),
}

impl KanbanSource {
    pub fn path(&self) -> &Path {
        match self {
            KanbanSource::Repository(p) | KanbanSource::Shared(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildParams {
    pub name: String,
    pub base_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub template: String,
    pub story: Option<StoryRef>,
    pub kanban: Option<KanbanSource>,
    pub ports: PortConfig,
}

/// A freshly built workspace plus the non-fatal problems hit while linking
/// the board or cloning the repository.
#[derive(Debug)]
pub struct Built {
    pub workspace: Workspace,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// Paths created during a build, removed newest-first on drop unless the
/// build committed.
struct Rollback {
    created: Vec<PathBuf>,
    /// Base directory made by this build; removed only if left empty.
    base: Option<PathBuf>,
    committed: bool,
}

impl Rollback {
    fn new() -> Self {
        Self {
            created: Vec::new(),
            base: None,
            committed: false,
        }
    }

    fn track(&mut self, path: PathBuf) {
        self.created.push(path);
    }

    fn write(&mut self, path: PathBuf, data: &str) -> Result<()> {
        self.track(path.clone());
        crate::io::atomic_write(&path, data.as_bytes())
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in self.created.iter().rev() {
            if let Err(e) = crate::io::remove_path(path) {
                tracing::warn!("rollback could not remove {}: {e}", path.display());
            }
        }
        if let Some(base) = &self.base {
            if let Err(e) = std::fs::remove_dir(base) {
                tracing::debug!("kept base directory {}: {e}", base.display());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    /// Location on disk. Rewritten from the actual directory on load.
    pub root_path: PathBuf,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<StoryRef>,
    /// Host port per compose service while started; empty otherwise.
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started_at: Option<DateTime<Utc>>,
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

impl Workspace {
    pub fn inner_dir(&self) -> PathBuf {
        paths::workspace_inner_dir(&self.root_path)
    }

    pub fn repo_dir(&self) -> PathBuf {
        paths::workspace_repo_dir(&self.root_path)
    }

    pub fn compose_file(&self) -> PathBuf {
        paths::compose_path(&self.root_path)
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Create a workspace directory from a template.
    ///
    /// Everything up to and including the manifest is all-or-nothing: on any
    /// error the paths created so far are removed in reverse order. Linking
    /// the board and cloning the repository happen afterwards and only
    /// produce warnings.
    pub fn build(params: &BuildParams, runner: &dyn CommandRunner) -> Result<Built> {
        paths::validate_name("workspace_name", &params.name)?;
        let root = paths::workspace_dir(&params.base_dir, &params.name);
        if root.exists() {
            return Err(FilterError::already_exists("workspace", root));
        }

        let tmpl = Template::resolve(&params.templates_dir, &params.template)?;
        let requests = tmpl.port_requests(&params.ports);
        let allocated = ports::allocate(&requests, params.ports.max_attempts)?;

        let mut rollback = Rollback::new();
        if !params.base_dir.is_dir() {
            crate::io::ensure_dir(&params.base_dir)?;
            rollback.base = Some(params.base_dir.clone());
        }
        match std::fs::create_dir(&root) {
            Ok(()) => rollback.track(root.clone()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(FilterError::already_exists("workspace", root));
            }
            Err(e) => return Err(e.into()),
        }
        let inner = paths::workspace_inner_dir(&root);
        std::fs::create_dir(&inner)?;
        rollback.track(inner.clone());

        let ctx = build_context(params, &allocated);
        let dockerfile = template::render(&tmpl.dockerfile_template(), &ctx)?;
        rollback.write(root.join(paths::DOCKERFILE), &dockerfile)?;
        let compose = template::render(&tmpl.compose_template(), &ctx)?;
        rollback.write(paths::compose_path(&root), &compose)?;
        let env = template::render(&tmpl.env_template(), &ctx)?;
        rollback.write(inner.join(paths::ENV_FILE), &env)?;

        let workspace = Workspace {
            name: params.name.clone(),
            root_path: root.clone(),
            template: tmpl.name.clone(),
            story: params.story.clone(),
            ports: BTreeMap::new(),
            created_at: Utc::now(),
            last_started_at: None,
        };
        rollback.track(paths::workspace_manifest(&root));
        workspace.save()?;
        rollback.commit();
        tracing::info!(workspace = %workspace.name, template = %workspace.template, "created workspace");

        let mut warnings = Vec::new();
        if let Some(source) = &params.kanban {
            if let Err(e) = link_kanban(source, &paths::workspace_kanban_dir(&root)) {
                warnings.push(format!(
                    "could not attach kanban board {}: {e}",
                    source.path().display()
                ));
            }
        }
        if let Some(url) = params.story.as_ref().and_then(|s| s.git_url.as_deref()) {
            if let Err(e) = clone_repo(runner, url, &workspace) {
                warnings.push(format!("repository not cloned: {e}"));
            }
        }
        for w in &warnings {
            tracing::warn!(workspace = %workspace.name, "{w}");
        }

        Ok(Built {
            workspace,
            warnings,
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(base_dir: &Path, name: &str) -> Result<Self> {
        paths::validate_name("workspace_name", name)?;
        let root = paths::workspace_dir(base_dir, name);
        let manifest = paths::workspace_manifest(&root);
        if !manifest.is_file() {
            return Err(FilterError::not_found("workspace", name));
        }
        let data = std::fs::read_to_string(&manifest)?;
        let mut ws: Workspace =
            serde_yaml::from_str(&data).map_err(FilterError::manifest(&manifest))?;
        ws.root_path = root;
        Ok(ws)
    }

    /// Like [`Workspace::load`], but a directory whose manifest is missing or
    /// unreadable (an interrupted build, a hand-edited file) still yields a
    /// descriptor so it can be stopped and deleted. `NotFound` only when the
    /// directory itself is gone.
    pub fn open(base_dir: &Path, name: &str) -> Result<Self> {
        match Self::load(base_dir, name) {
            Ok(ws) => Ok(ws),
            Err(FilterError::NotFound { .. } | FilterError::Manifest { .. })
                if paths::workspace_dir(base_dir, name).is_dir() =>
            {
                tracing::warn!(workspace = name, "manifest missing or invalid, using directory only");
                Ok(Self::from_directory(base_dir, name))
            }
            Err(e) => Err(e),
        }
    }

    fn from_directory(base_dir: &Path, name: &str) -> Self {
        let root_path = paths::workspace_dir(base_dir, name);
        let created_at = std::fs::metadata(&root_path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Workspace {
            name: name.to_string(),
            root_path,
            template: String::new(),
            story: None,
            ports: BTreeMap::new(),
            created_at,
            last_started_at: None,
        }
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::workspace_manifest(&self.root_path), data.as_bytes())
    }

    /// Workspaces under `base_dir`, sorted by name. Directories without a
    /// manifest are skipped; unparseable manifests are skipped with a warning.
    pub fn list(base_dir: &Path) -> Result<Vec<Self>> {
        if !base_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match Self::load(base_dir, &name) {
                Ok(ws) => out.push(ws),
                Err(FilterError::NotFound { .. }) | Err(FilterError::InvalidName { .. }) => {}
                Err(e @ FilterError::Manifest { .. }) => {
                    tracing::warn!("skipping workspace '{name}': {e}");
                }
                Err(e) => return Err(e),
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn ensure_present(&self) -> Result<()> {
        if self.root_path.is_dir() {
            Ok(())
        } else {
            Err(FilterError::not_found("workspace", &self.name))
        }
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn state(&self, runner: &dyn CommandRunner) -> WorkspaceState {
        if !self.root_path.is_dir() {
            return WorkspaceState::Deleted;
        }
        match docker::running_containers(runner, &self.root_path) {
            Ok(ids) if !ids.is_empty() => WorkspaceState::Running,
            Ok(_) if self.last_started_at.is_none() => WorkspaceState::Created,
            Ok(_) => WorkspaceState::Stopped,
            Err(e) => {
                tracing::warn!(
                    workspace = %self.name,
                    "container runtime unreachable, reporting stopped: {e}"
                );
                WorkspaceState::Stopped
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Publish host ports and bring the containers up.
    ///
    /// Recorded ports are reused; otherwise each published service scans
    /// upward from the host port currently in the compose file. If `up`
    /// fails, containers are taken down again and the directory is kept.
    pub fn start(&mut self, runner: &dyn CommandRunner, max_attempts: u16) -> Result<()> {
        self.ensure_present()?;
        let compose = self.compose_file();

        let assigned = if self.ports.is_empty() {
            let requests: Vec<ports::PortRequest> = docker::published_ports(&compose)?
                .into_iter()
                .map(|(service, host)| ports::PortRequest::new(service, host, 0))
                .collect();
            ports::allocate(&requests, max_attempts)?
        } else {
            self.ports.clone()
        };
        docker::rewrite_ports(&compose, &assigned)?;
        rewrite_env_ports(&self.inner_dir().join(paths::ENV_FILE), &assigned)?;

        if let Err(e) = docker::up(runner, &self.root_path) {
            match docker::logs_tail(runner, &self.root_path, FAILED_START_LOG_LINES) {
                Ok(logs) if !logs.trim().is_empty() => {
                    tracing::debug!(workspace = %self.name, "container logs:\n{logs}")
                }
                _ => {}
            }
            if let Err(down_err) = docker::down(runner, &self.root_path, false) {
                tracing::warn!(workspace = %self.name, "cleanup after failed start: {down_err}");
            }
            return Err(e);
        }

        self.ports = assigned;
        self.last_started_at = Some(Utc::now());
        self.save()?;
        tracing::info!(workspace = %self.name, ports = ?self.ports, "started workspace");
        Ok(())
    }

    /// Take the containers down and clear the recorded ports. A failing
    /// `down` is logged, not returned.
    pub fn stop(&mut self, runner: &dyn CommandRunner) -> Result<()> {
        self.ensure_present()?;
        if let Err(e) = docker::down(runner, &self.root_path, false) {
            tracing::warn!(workspace = %self.name, "stop: {e}");
        }
        self.ports.clear();
        if let Err(e) = self.save() {
            tracing::warn!(workspace = %self.name, "could not update manifest: {e}");
        }
        tracing::info!(workspace = %self.name, "stopped workspace");
        Ok(())
    }

    /// Remove the workspace directory. A running workspace is only removed
    /// with `force`, which first takes it down (volumes included).
    pub fn delete(self, runner: &dyn CommandRunner, force: bool) -> Result<()> {
        self.ensure_present()?;
        let running = self.state(runner) == WorkspaceState::Running;
        if running && !force {
            return Err(FilterError::Busy(self.name.clone()));
        }
        if force {
            if let Err(e) = docker::down(runner, &self.root_path, true) {
                tracing::warn!(workspace = %self.name, "delete: {e}");
            }
        }
        crate::io::remove_path(&self.repo_dir())?;
        std::fs::remove_dir_all(&self.root_path)?;
        tracing::info!(workspace = %self.name, "deleted workspace");
        Ok(())
    }

    /// Run `cmd` inside `service`, attached to the terminal.
    pub fn exec(&self, runner: &dyn CommandRunner, service: &str, cmd: &[&str]) -> Result<i32> {
        self.ensure_present()?;
        docker::exec(runner, &self.root_path, service, cmd)
    }
}

// ---------------------------------------------------------------------------
// Build helpers
// ---------------------------------------------------------------------------

fn build_context(params: &BuildParams, allocated: &BTreeMap<String, u16>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("workspace_name".into(), params.name.clone().into());
    ctx.insert("template".into(), params.template.clone().into());
    for (service, port) in allocated {
        ctx.insert(format!("{service}_port"), (*port).into());
    }
    ctx.insert("postgres_user".into(), DB_USER.into());
    ctx.insert("postgres_db".into(), DB_NAME.into());
    ctx.insert("postgres_password".into(), random_password().into());

    if let Some(story) = &params.story {
        ctx.insert("story_id".into(), story.story_id.clone().into());
        ctx.insert("project_name".into(), story.project_name.clone().into());
        if let Some(url) = &story.git_url {
            ctx.insert("git_url".into(), url.clone().into());
            ctx.insert("branch".into(), params.name.clone().into());
        }
    }
    if let Some(source) = &params.kanban {
        ctx.insert(
            "kanban_path".into(),
            source.path().display().to_string().into(),
        );
    }
    ctx
}

/// Point `{SERVICE}_HOST_PORT` lines of the workspace `.env` at `ports`.
/// Other lines, and services without such a line, are left alone.
fn rewrite_env_ports(env_file: &Path, ports: &BTreeMap<String, u16>) -> Result<()> {
    let data = match std::fs::read_to_string(env_file) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let keys: BTreeMap<String, u16> = ports
        .iter()
        .map(|(service, port)| (format!("{}_HOST_PORT", service.to_uppercase()), *port))
        .collect();
    let mut out = String::with_capacity(data.len());
    for line in data.lines() {
        match line.split_once('=').and_then(|(k, _)| keys.get(k).map(|p| (k, p))) {
            Some((key, port)) => out.push_str(&format!("{key}={port}")),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    if out != data {
        crate::io::atomic_write(env_file, out.as_bytes())?;
    }
    Ok(())
}

fn link_kanban(source: &KanbanSource, dest: &Path) -> Result<()> {
    let src = source.path();
    if !src.is_dir() {
        return Err(FilterError::not_found("kanban directory", src.display().to_string()));
    }
    match source {
        KanbanSource::Repository(_) => {
            #[cfg(unix)]
            {
                let target = src.canonicalize()?;
                match std::os::unix::fs::symlink(&target, dest) {
                    Ok(()) => return Ok(()),
                    Err(e) => tracing::debug!("symlink failed, copying board instead: {e}"),
                }
            }
            crate::io::copy_dir_all(src, dest)
        }
        KanbanSource::Shared(_) => crate::io::copy_dir_all(src, dest),
    }
}

fn clone_repo(runner: &dyn CommandRunner, url: &str, ws: &Workspace) -> Result<()> {
    let repo = ws.repo_dir();
    git::clone(runner, url, &repo)?;
    git::checkout_branch(runner, &repo, &ws.name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
