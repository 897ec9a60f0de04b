use crate::error::{FilterError, Result};
use crate::kanban::{self, Stage};
use crate::paths;
use crate::project::Project;
use crate::template::{self, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const STORY_TEMPLATE: &str = include_str!("../templates/story.md.j2");

// ---------------------------------------------------------------------------
// StoryRef
// ---------------------------------------------------------------------------

/// The story a workspace was built for. Recorded in `workspace.yaml` and fed
/// into template rendering and branch naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRef {
    pub story_id: String,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Story
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Story {
    pub id: String,
    pub project: String,
    pub stage: Stage,
    pub path: PathBuf,
}

/// Options for [`Story::create`].
#[derive(Debug, Clone)]
pub struct NewStory {
    /// Explicit id; generated from the project prefix when `None`.
    pub id: Option<String>,
    pub description: String,
    pub branch_from: String,
    pub merge_to: String,
    pub feature_suffix: Option<String>,
}

impl Default for NewStory {
    fn default() -> Self {
        Self {
            id: None,
            description: String::new(),
            branch_from: "main".to_string(),
            merge_to: "main".to_string(),
            feature_suffix: None,
        }
    }
}

/// Next free `{prefix}-{n}` id on the board, one past the highest number in
/// any stage.
pub fn next_story_id(kanban_dir: &Path, prefix: &str) -> Result<String> {
    let re = Regex::new(&format!(r"^{}-(\d+)$", regex::escape(prefix)))
        .map_err(|e| FilterError::InvalidName {
            field: "prefix",
            value: prefix.to_string(),
            reason: e.to_string(),
        })?;
    let max = kanban::cards(kanban_dir)?
        .iter()
        .filter_map(|c| re.captures(&c.id))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    Ok(format!("{prefix}-{}", max + 1))
}

impl Story {
    fn from_card(project: &str, card: kanban::Card) -> Self {
        Self {
            id: card.id,
            project: project.to_string(),
            stage: card.stage,
            path: card.path,
        }
    }

    /// Render a new story card into the project's `stories` stage.
    pub fn create(projects_dir: &Path, project: &Project, new: NewStory) -> Result<Self> {
        let board = project.kanban_dir(projects_dir);
        let id = match new.id {
            Some(id) => id,
            None => next_story_id(&board, &project.prefix)?,
        };
        paths::validate_name("story id", &id)?;
        if let Some(existing) = kanban::find_card(&board, &id) {
            return Err(FilterError::already_exists("story", existing.path));
        }

        let feature_branch = match &new.feature_suffix {
            Some(suffix) => {
                paths::validate_name("feature suffix", suffix)?;
                format!("{id}-{suffix}")
            }
            None => id.clone(),
        };

        let mut ctx = Context::new();
        ctx.insert("story_id".into(), id.clone().into());
        ctx.insert("story_description".into(), new.description.into());
        ctx.insert(
            "repository".into(),
            project.git_url.clone().unwrap_or_default().into(),
        );
        ctx.insert("branch_from".into(), new.branch_from.into());
        ctx.insert("merge_to".into(), new.merge_to.into());
        ctx.insert("feature_branch".into(), feature_branch.into());
        ctx.insert(
            "created_at".into(),
            chrono::Utc::now().format("%Y-%m-%d").to_string().into(),
        );
        let body = template::render_source(Path::new("story.md.j2"), STORY_TEMPLATE, &ctx)?;

        let path = Stage::Stories.dir(&board).join(format!("{id}.md"));
        crate::io::atomic_write(&path, body.as_bytes())?;
        tracing::info!(story = %id, project = %project.name, "created story");

        Ok(Self {
            id,
            project: project.name.clone(),
            stage: Stage::Stories,
            path,
        })
    }

    /// Stories across all projects, or just `project` when given.
    pub fn list(projects_dir: &Path, project: Option<&str>) -> Result<Vec<Self>> {
        let projects = match project {
            Some(name) => vec![Project::load(projects_dir, name)?],
            None => Project::list(projects_dir)?,
        };
        let mut stories = Vec::new();
        for p in projects {
            for card in kanban::cards(&p.kanban_dir(projects_dir))? {
                stories.push(Self::from_card(&p.name, card));
            }
        }
        Ok(stories)
    }

    /// Locate `id` on any project's board.
    pub fn find(projects_dir: &Path, id: &str) -> Result<Self> {
        paths::validate_name("story id", id)?;
        for p in Project::list(projects_dir)? {
            if let Some(card) = kanban::find_card(&p.kanban_dir(projects_dir), id) {
                return Ok(Self::from_card(&p.name, card));
            }
        }
        Err(FilterError::not_found("story", id))
    }

    pub fn move_to(projects_dir: &Path, id: &str, stage: Stage) -> Result<Self> {
        let story = Self::find(projects_dir, id)?;
        let board = paths::project_kanban_dir(projects_dir, &story.project);
        let card = kanban::move_card(&board, id, stage)?;
        Ok(Self::from_card(&story.project, card))
    }

    pub fn delete(projects_dir: &Path, id: &str) -> Result<Self> {
        let story = Self::find(projects_dir, id)?;
        std::fs::remove_file(&story.path)?;
        tracing::info!(story = id, project = %story.project, "deleted story");
        Ok(story)
    }

    /// The reference a workspace built for this story records.
    pub fn to_ref(&self, projects_dir: &Path) -> Result<StoryRef> {
        let project = Project::load(projects_dir, &self.project)?;
        Ok(StoryRef {
            story_id: self.id.clone(),
            project_name: project.name,
            git_url: project.git_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::NewProject;
    use tempfile::TempDir;

    fn project(dir: &Path, name: &str) -> Project {
        Project::create(
            dir,
            name,
            NewProject {
                git_url: Some(format!("https://example.com/{name}.git")),
                kanban_seed: Some(dir.join("none")),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn ids_increment_from_highest_in_any_stage() {
        let dir = TempDir::new().unwrap();
        let p = project(dir.path(), "ib-stream");
        let board = p.kanban_dir(dir.path());
        assert_eq!(next_story_id(&board, "ibstr").unwrap(), "ibstr-1");

        std::fs::write(board.join("stories/ibstr-2.md"), "").unwrap();
        std::fs::write(board.join("complete/ibstr-7.md"), "").unwrap();
        std::fs::write(board.join("stories/other-99.md"), "").unwrap();
        assert_eq!(next_story_id(&board, "ibstr").unwrap(), "ibstr-8");
    }

    #[test]
    fn create_renders_card() {
        let dir = TempDir::new().unwrap();
        let p = project(dir.path(), "ib-stream");
        let story = Story::create(
            dir.path(),
            &p,
            NewStory {
                description: "Add tick replay".to_string(),
                feature_suffix: Some("replay".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(story.id, "ibstr-1");
        let body = std::fs::read_to_string(&story.path).unwrap();
        assert!(body.starts_with("# ibstr-1"));
        assert!(body.contains("Add tick replay"));
        assert!(body.contains("`ibstr-1-replay`"));
        assert!(body.contains("https://example.com/ib-stream.git"));
    }

    #[test]
    fn create_duplicate_id_fails() {
        let dir = TempDir::new().unwrap();
        let p = project(dir.path(), "demo");
        let new = || NewStory {
            id: Some("demo-1".to_string()),
            ..Default::default()
        };
        Story::create(dir.path(), &p, new()).unwrap();
        assert!(matches!(
            Story::create(dir.path(), &p, new()),
            Err(FilterError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn find_move_delete() {
        let dir = TempDir::new().unwrap();
        let a = project(dir.path(), "alpha");
        project(dir.path(), "beta");
        Story::create(dir.path(), &a, NewStory::default()).unwrap();

        let found = Story::find(dir.path(), "alpha-1").unwrap();
        assert_eq!(found.project, "alpha");

        let moved = Story::move_to(dir.path(), "alpha-1", Stage::Testing).unwrap();
        assert_eq!(moved.stage, Stage::Testing);
        assert_eq!(Story::list(dir.path(), Some("alpha")).unwrap().len(), 1);
        assert!(Story::list(dir.path(), Some("beta")).unwrap().is_empty());

        let r = moved.to_ref(dir.path()).unwrap();
        assert_eq!(r.project_name, "alpha");
        assert_eq!(r.git_url.as_deref(), Some("https://example.com/alpha.git"));

        Story::delete(dir.path(), "alpha-1").unwrap();
        assert!(matches!(
            Story::find(dir.path(), "alpha-1"),
            Err(FilterError::NotFound { .. })
        ));
    }
}
