use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("{kind} already exists: {}", .path.display())]
    AlreadyExists { kind: &'static str, path: PathBuf },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("failed to render template {}: {source}", .path.display())]
    TemplateRender {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("no available port in range {start}-{end}")]
    ResourceExhausted { start: u16, end: u16 },

    #[error("workspace '{0}' is running: stop it first or pass --force")]
    Busy(String),

    #[error("`{command}` failed ({status}): {stderr}")]
    ExternalTool {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("required tool '{0}' not found on PATH")]
    ToolMissing(String),

    #[error("invalid stage '{0}': expected one of stories, planning, in-progress, testing, pr, complete, prompts")]
    InvalidStage(String),

    #[error("invalid compose file {}: {reason}", .path.display())]
    InvalidCompose { path: PathBuf, reason: String },

    #[error("invalid manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FilterError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        FilterError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn manifest(path: impl Into<PathBuf>) -> impl FnOnce(serde_yaml::Error) -> Self {
        let path = path.into();
        move |source| FilterError::Manifest { path, source }
    }

    pub fn already_exists(kind: &'static str, path: impl Into<PathBuf>) -> Self {
        FilterError::AlreadyExists {
            kind,
            path: path.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
