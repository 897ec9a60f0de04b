use filter_core::paths::FILTER_DIR;
use std::path::{Path, PathBuf};

/// Resolve the repository root.
///
/// Priority:
/// 1. `--root` flag / `FILTER_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of the cwd containing `.filter/`
/// 3. Nearest ancestor of the cwd containing `.git/`
/// 4. The cwd itself
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd)
}

fn find_root_from(start: &Path) -> PathBuf {
    [FILTER_DIR, ".git"]
        .into_iter()
        .find_map(|marker| start.ancestors().find(|d| d.join(marker).is_dir()))
        .unwrap_or(start)
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn filter_dir_beats_git_dir() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::create_dir_all(repo.join("sub/.filter")).unwrap();
        let deep = repo.join("sub/src/deep");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_root_from(&deep), repo.join("sub"));
        assert_eq!(find_root_from(&repo), repo);
    }

    #[test]
    fn falls_back_to_start() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("a/b");
        std::fs::create_dir_all(&inner).unwrap();
        // Only meaningful when no ancestor of the temp dir is a repository.
        if dir.path().ancestors().all(|d| !d.join(".git").is_dir() && !d.join(".filter").is_dir()) {
            assert_eq!(find_root_from(&inner), inner);
        }
    }
}
