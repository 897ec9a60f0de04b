use crate::error::{FilterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A kanban column. Each stage is a directory under the kanban root holding
/// one markdown file per story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Stories,
    Planning,
    InProgress,
    Testing,
    Pr,
    Complete,
    Prompts,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Stories,
        Stage::Planning,
        Stage::InProgress,
        Stage::Testing,
        Stage::Pr,
        Stage::Complete,
        Stage::Prompts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Stories => "stories",
            Stage::Planning => "planning",
            Stage::InProgress => "in-progress",
            Stage::Testing => "testing",
            Stage::Pr => "pr",
            Stage::Complete => "complete",
            Stage::Prompts => "prompts",
        }
    }

    pub fn dir(self, kanban_dir: &Path) -> PathBuf {
        kanban_dir.join(self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| FilterError::InvalidStage(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Board structure
// ---------------------------------------------------------------------------

/// Create every stage directory under `kanban_dir`, each with a `.gitkeep`.
/// Existing directories and files are left alone.
pub fn create_structure(kanban_dir: &Path) -> Result<()> {
    for stage in Stage::ALL {
        let dir = stage.dir(kanban_dir);
        crate::io::ensure_dir(&dir)?;
        crate::io::write_if_missing(&dir.join(".gitkeep"), b"")?;
    }
    Ok(())
}

/// A story file found on a board.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub id: String,
    pub stage: Stage,
    pub path: PathBuf,
}

/// All `*.md` cards on the board, in stage order then id order.
pub fn cards(kanban_dir: &Path) -> Result<Vec<Card>> {
    let mut out = Vec::new();
    for stage in Stage::ALL {
        let dir = stage.dir(kanban_dir);
        if !dir.is_dir() {
            continue;
        }
        let mut in_stage = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            in_stage.push(Card {
                id: id.to_string(),
                stage,
                path: path.clone(),
            });
        }
        in_stage.sort_by(|a, b| a.id.cmp(&b.id));
        out.extend(in_stage);
    }
    Ok(out)
}

/// Locate the card for `id` in any stage.
pub fn find_card(kanban_dir: &Path, id: &str) -> Option<Card> {
    Stage::ALL.into_iter().find_map(|stage| {
        let path = stage.dir(kanban_dir).join(format!("{id}.md"));
        path.is_file().then(|| Card {
            id: id.to_string(),
            stage,
            path,
        })
    })
}

/// Move the card for `id` to `to`. Moving to its current stage is a no-op.
pub fn move_card(kanban_dir: &Path, id: &str, to: Stage) -> Result<Card> {
    let card = find_card(kanban_dir, id).ok_or_else(|| FilterError::not_found("story", id))?;
    if card.stage == to {
        return Ok(card);
    }
    let dest_dir = to.dir(kanban_dir);
    crate::io::ensure_dir(&dest_dir)?;
    let dest = dest_dir.join(format!("{id}.md"));
    std::fs::rename(&card.path, &dest)?;
    tracing::info!(story = id, from = %card.stage, to = %to, "moved story");
    Ok(Card {
        id: id.to_string(),
        stage: to,
        path: dest,
    })
}
