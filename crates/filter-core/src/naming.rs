//! Workspace name derivation.
//!
//! Uniqueness is checked against the directories present in `base_dir` at
//! call time only. Two processes racing on the same base name can pick the
//! same candidate; the builder's create step reports `AlreadyExists` for the
//! loser.

use crate::error::Result;
use crate::paths;
use std::path::Path;

/// Derive a workspace name from `base` (a story id or user-supplied name).
///
/// With `suffix`, the result is `{base}-{suffix}`. Without, it is
/// `{base}-ws-{n}` for the smallest `n >= 1` not already present in
/// `base_dir`.
pub fn workspace_name(base_dir: &Path, base: &str, suffix: Option<&str>) -> Result<String> {
    paths::validate_name("base name", base)?;

    if let Some(suffix) = suffix {
        paths::validate_name("suffix", suffix)?;
        let name = format!("{base}-{suffix}");
        paths::validate_name("workspace_name", &name)?;
        return Ok(name);
    }

    let mut n: u32 = 1;
    loop {
        let candidate = format!("{base}-ws-{n}");
        if !base_dir.join(&candidate).exists() {
            paths::validate_name("workspace_name", &candidate)?;
            return Ok(candidate);
        }
        n += 1;
    }
}
