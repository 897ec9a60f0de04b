use crate::error::Result;
use crate::process::CommandRunner;
use std::path::Path;

pub const GIT: &str = "git";

fn git(runner: &dyn CommandRunner, cwd: &Path, args: &[&str]) -> Result<String> {
    let out = runner.run(GIT, args, cwd)?.check(GIT, args)?;
    Ok(out.stdout)
}

/// Clone `url` into `dest`. `dest` must not exist yet.
pub fn clone(runner: &dyn CommandRunner, url: &str, dest: &Path) -> Result<()> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    let dest_str = dest.to_string_lossy();
    git(runner, parent, &["clone", url, &dest_str])?;
    tracing::info!(url, dest = %dest.display(), "cloned repository");
    Ok(())
}

/// Create and check out `branch`, or check it out if it already exists on the
/// remote.
pub fn checkout_branch(runner: &dyn CommandRunner, repo: &Path, branch: &str) -> Result<()> {
    match git(runner, repo, &["checkout", "-b", branch]) {
        Ok(_) => Ok(()),
        Err(create_err) => {
            tracing::debug!("`git checkout -b {branch}` failed, trying existing branch");
            git(runner, repo, &["checkout", branch])
                .map(|_| ())
                .map_err(|_| create_err)
        }
    }
}

/// Whether `origin` accepts a push from `repo`, probed with a dry run.
pub fn has_push_access(runner: &dyn CommandRunner, repo: &Path) -> bool {
    match runner.run(GIT, &["push", "--dry-run", "origin", "HEAD"], repo) {
        Ok(out) => out.success(),
        Err(e) => {
            tracing::debug!("push access probe failed: {e}");
            false
        }
    }
}
