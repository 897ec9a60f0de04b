//! Workspace templates and text rendering.
//!
//! A template is a directory holding `Dockerfile.j2`, `docker-compose.yml.j2`,
//! `env.j2` and a `template.yaml` metadata file. Rendering uses minijinja with
//! strict undefined handling and autoescaping turned off, since every output
//! is a Dockerfile, YAML, or env file.

use crate::config::PortConfig;
use crate::error::{FilterError, Result};
use crate::paths;
use crate::ports::PortRequest;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Variables available to a template.
pub type Context = BTreeMap<String, serde_json::Value>;

pub const FEATURE_POSTGRES: &str = "postgres";
pub const FEATURE_JUPYTER: &str = "jupyter";

pub const APP_SERVICE: &str = "app";
pub const APP_CONTAINER_PORT: u16 = 8000;
pub const POSTGRES_CONTAINER_PORT: u16 = 5432;
pub const JUPYTER_CONTAINER_PORT: u16 = 8888;

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env
}

/// Render template source text. `origin` names the source in error messages.
pub fn render_source(origin: &Path, source: &str, context: &Context) -> Result<String> {
    let name = origin.display().to_string();
    environment()
        .render_named_str(&name, source, context)
        .map_err(|source| FilterError::TemplateRender {
            path: origin.to_path_buf(),
            source,
        })
}

/// Render the template file at `template_path` with `context`.
pub fn render(template_path: &Path, context: &Context) -> Result<String> {
    if !template_path.is_file() {
        return Err(FilterError::TemplateNotFound(template_path.to_path_buf()));
    }
    let source = std::fs::read_to_string(template_path)?;
    render_source(template_path, &source, context)
}

// ---------------------------------------------------------------------------
// TemplateMeta / Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub name: String,
    pub dir: PathBuf,
    pub meta: TemplateMeta,
}

impl Template {
    /// Resolve `name` under `templates_dir`.
    pub fn resolve(templates_dir: &Path, name: &str) -> Result<Self> {
        paths::validate_name("template", name)?;
        let dir = paths::template_dir(templates_dir, name);
        if !dir.is_dir() {
            return Err(FilterError::TemplateNotFound(dir));
        }
        let meta_path = dir.join(paths::TEMPLATE_META);
        let mut meta = if meta_path.exists() {
            let data = std::fs::read_to_string(&meta_path)?;
            serde_yaml::from_str::<TemplateMeta>(&data)?
        } else {
            TemplateMeta::default()
        };
        if meta.name.is_empty() {
            meta.name = name.to_string();
        }
        Ok(Self {
            name: name.to_string(),
            dir,
            meta,
        })
    }

    /// All templates under `templates_dir`, sorted by name. Directories with
    /// unparseable metadata are skipped with a warning.
    pub fn list(templates_dir: &Path) -> Result<Vec<Self>> {
        if !templates_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut templates = Vec::new();
        for entry in std::fs::read_dir(templates_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match Self::resolve(templates_dir, &name) {
                Ok(t) => templates.push(t),
                Err(e) => tracing::warn!("skipping template '{name}': {e}"),
            }
        }
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.meta.features.iter().any(|f| f == feature)
    }

    /// Host ports this template needs: always the app port, plus one per
    /// declared service feature.
    pub fn port_requests(&self, ports: &PortConfig) -> Vec<PortRequest> {
        let mut requests = vec![PortRequest::new(APP_SERVICE, ports.app, APP_CONTAINER_PORT)];
        if self.has_feature(FEATURE_POSTGRES) {
            requests.push(PortRequest::new(
                FEATURE_POSTGRES,
                ports.postgres,
                POSTGRES_CONTAINER_PORT,
            ));
        }
        if self.has_feature(FEATURE_JUPYTER) {
            requests.push(PortRequest::new(
                FEATURE_JUPYTER,
                ports.jupyter,
                JUPYTER_CONTAINER_PORT,
            ));
        }
        requests
    }

    pub fn dockerfile_template(&self) -> PathBuf {
        self.dir.join(paths::DOCKERFILE_TEMPLATE)
    }

    pub fn compose_template(&self) -> PathBuf {
        self.dir.join(paths::COMPOSE_TEMPLATE)
    }

    pub fn env_template(&self) -> PathBuf {
        self.dir.join(paths::ENV_TEMPLATE)
    }
}

// ---------------------------------------------------------------------------
// Built-in templates
// ---------------------------------------------------------------------------

struct BuiltinFile {
    template: &'static str,
    file: &'static str,
    content: &'static str,
}

const BUILTIN: &[BuiltinFile] = &[
    BuiltinFile {
        template: "default",
        file: paths::TEMPLATE_META,
        content: include_str!("../templates/default/template.yaml"),
    },
    BuiltinFile {
        template: "default",
        file: paths::DOCKERFILE_TEMPLATE,
        content: include_str!("../templates/default/Dockerfile.j2"),
    },
    BuiltinFile {
        template: "default",
        file: paths::COMPOSE_TEMPLATE,
        content: include_str!("../templates/default/docker-compose.yml.j2"),
    },
    BuiltinFile {
        template: "default",
        file: paths::ENV_TEMPLATE,
        content: include_str!("../templates/default/env.j2"),
    },
    BuiltinFile {
        template: "minimal",
        file: paths::TEMPLATE_META,
        content: include_str!("../templates/minimal/template.yaml"),
    },
    BuiltinFile {
        template: "minimal",
        file: paths::DOCKERFILE_TEMPLATE,
        content: include_str!("../templates/minimal/Dockerfile.j2"),
    },
    BuiltinFile {
        template: "minimal",
        file: paths::COMPOSE_TEMPLATE,
        content: include_str!("../templates/minimal/docker-compose.yml.j2"),
    },
    BuiltinFile {
        template: "minimal",
        file: paths::ENV_TEMPLATE,
        content: include_str!("../templates/minimal/env.j2"),
    },
    BuiltinFile {
        template: "python",
        file: paths::TEMPLATE_META,
        content: include_str!("../templates/python/template.yaml"),
    },
    BuiltinFile {
        template: "python",
        file: paths::DOCKERFILE_TEMPLATE,
        content: include_str!("../templates/python/Dockerfile.j2"),
    },
    BuiltinFile {
        template: "python",
        file: paths::COMPOSE_TEMPLATE,
        content: include_str!("../templates/python/docker-compose.yml.j2"),
    },
    BuiltinFile {
        template: "python",
        file: paths::ENV_TEMPLATE,
        content: include_str!("../templates/python/env.j2"),
    },
];

/// Write the built-in `default`, `minimal` and `python` templates into
/// `templates_dir`. Existing files are kept unless `overwrite` is set.
/// Returns the paths that were written.
pub fn install_builtin(templates_dir: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for f in BUILTIN {
        let path = templates_dir.join(f.template).join(f.file);
        if overwrite {
            crate::io::atomic_write(&path, f.content.as_bytes())?;
            written.push(path);
        } else if crate::io::write_if_missing(&path, f.content.as_bytes())? {
            written.push(path);
        }
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
