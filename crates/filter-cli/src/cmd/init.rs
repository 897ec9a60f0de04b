use crate::output::print_json;
use anyhow::Context;
use filter_core::{config::Config, io, kanban, metadata, metadata::RepoMetadata, paths, template};
use std::path::Path;

pub fn run(
    root: &Path,
    project_name: Option<&str>,
    prefix: Option<&str>,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut created: Vec<String> = Vec::new();

    io::ensure_dir(&paths::filter_dir(root))
        .with_context(|| format!("failed to create {}", paths::filter_dir(root).display()))?;

    // 1. config.yaml
    let config_path = paths::config_path(root);
    if !config_path.exists() {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        created.push(relative(root, &config_path));
    }
    let cfg = Config::load(root).context("failed to load config.yaml")?;

    // 2. metadata.yaml
    let already = metadata::is_initialized(root);
    if !already || force {
        let name = match project_name {
            Some(n) => n.to_string(),
            None => default_project_name(root),
        };
        let meta = RepoMetadata::new(&name, prefix)
            .with_context(|| format!("invalid project metadata for '{name}'"))?;
        meta.save(root).context("failed to write metadata.yaml")?;
        created.push(relative(root, &paths::metadata_path(root)));
    } else if project_name.is_some() || prefix.is_some() {
        tracing::warn!("metadata.yaml exists; pass --force to replace project name or prefix");
    }

    // 3. repository board
    let board = cfg.kanban_dir(root)?;
    let board_existed = board.is_dir();
    kanban::create_structure(&board)
        .with_context(|| format!("failed to create kanban board at {}", board.display()))?;
    if !board_existed {
        created.push(relative(root, &board));
    }

    // 4. built-in templates
    let templates_dir = cfg.templates_dir(root)?;
    let written = template::install_builtin(&templates_dir, force)
        .with_context(|| format!("failed to install templates into {}", templates_dir.display()))?;
    created.extend(written.iter().map(|p| relative(root, p)));

    // 5. keep workspaces out of git
    let ws_dir = Path::new(&cfg.workspaces_directory);
    if ws_dir.is_relative() && !cfg.workspaces_directory.starts_with("..") {
        let entry = format!("/{}/", cfg.workspaces_directory.trim_end_matches('/'));
        io::ensure_gitignore_entry(root, &entry).context("failed to update .gitignore")?;
    }

    let meta = RepoMetadata::load(root).context("failed to read metadata.yaml")?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "project_name": meta.project_name,
            "prefix": meta.prefix,
            "created": created,
        }))?;
        return Ok(());
    }

    println!("Initialized filter in {}", root.display());
    println!("  project: {} (prefix '{}')", meta.project_name, meta.prefix);
    if created.is_empty() {
        println!("  nothing to do, already initialized");
    }
    for path in &created {
        println!("  created: {path}");
    }
    println!("\nNext: filter project create <name>  or  filter workspace create <name>");
    Ok(())
}

fn relative(root: &Path, p: &Path) -> String {
    p.strip_prefix(root).unwrap_or(p).display().to_string()
}

/// The root directory's name, reduced to characters valid in a project name.
fn default_project_name(root: &Path) -> String {
    let raw = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches(['-', '_']);
    let name: String = trimmed.chars().take(paths::MAX_NAME_LEN).collect();
    if name.is_empty() {
        "project".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn project_name_from_directory() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("My Repo.v2");
        std::fs::create_dir_all(&repo).unwrap();
        assert_eq!(default_project_name(&repo), "My-Repo-v2");
    }

    #[test]
    fn leading_separators_dropped() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("__tmp");
        std::fs::create_dir_all(&repo).unwrap();
        assert_eq!(default_project_name(&repo), "tmp");
    }
}
