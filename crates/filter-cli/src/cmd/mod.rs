pub mod config;
pub mod init;
pub mod project;
pub mod story;
pub mod template;
pub mod workspace;
