pub mod config;
pub mod docker;
pub mod error;
pub mod git;
pub mod io;
pub mod kanban;
pub mod metadata;
pub mod naming;
pub mod paths;
pub mod ports;
pub mod process;
pub mod project;
pub mod story;
pub mod template;
pub mod workspace;

pub use error::{FilterError, Result};
