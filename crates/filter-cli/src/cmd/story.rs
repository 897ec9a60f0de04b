use crate::cmd::workspace::{print_built, DEFAULT_TEMPLATE};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use filter_core::{
    config::Config,
    git, naming,
    process::SystemRunner,
    project::Project,
    story::{NewStory, Story},
    workspace::{BuildParams, KanbanSource, Workspace},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum StorySubcommand {
    /// Create a story card on a project board
    Create {
        /// Project the story belongs to
        #[arg(long)]
        project: String,
        /// Story id (default: next `{prefix}-{n}`)
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "main")]
        branch_from: String,
        #[arg(long, default_value = "main")]
        merge_to: String,
        /// Feature branch becomes `{id}-{suffix}`
        #[arg(long)]
        feature_suffix: Option<String>,
    },
    /// List stories
    List {
        /// Only this project
        #[arg(long)]
        project: Option<String>,
    },
    /// Move a story to another stage
    Move {
        id: String,
        /// stories | planning | in-progress | testing | pr | complete | prompts
        stage: String,
    },
    /// Delete a story card
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
    /// Build a workspace for a story, cloning the project repository
    Workspace {
        id: String,
        /// Workspace name suffix (default: ws-N)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,
        /// Don't copy the project board into the workspace
        #[arg(long)]
        no_kanban: bool,
    },
}

pub fn run(root: &Path, subcmd: StorySubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let projects_dir = config.projects_dir(root)?;
    match subcmd {
        StorySubcommand::Create {
            project,
            id,
            description,
            branch_from,
            merge_to,
            feature_suffix,
        } => {
            let new = NewStory {
                id,
                description,
                branch_from,
                merge_to,
                feature_suffix,
            };
            create(&projects_dir, &project, new, json)
        }
        StorySubcommand::List { project } => list(&projects_dir, project.as_deref(), json),
        StorySubcommand::Move { id, stage } => move_story(&projects_dir, &id, &stage, json),
        StorySubcommand::Delete { id, force } => delete(&projects_dir, &id, force, json),
        StorySubcommand::Workspace {
            id,
            name,
            template,
            no_kanban,
        } => workspace(
            root,
            &config,
            &id,
            name.as_deref(),
            &template,
            no_kanban,
            json,
        ),
    }
}

fn create(projects_dir: &Path, project: &str, new: NewStory, json: bool) -> anyhow::Result<()> {
    let project = Project::load(projects_dir, project)
        .with_context(|| format!("failed to load project '{project}'"))?;
    let story = Story::create(projects_dir, &project, new)
        .with_context(|| format!("failed to create story in '{}'", project.name))?;

    if json {
        print_json(&story)?;
    } else {
        println!("Created story '{}' at {}", story.id, story.path.display());
        println!("Next: filter story workspace {}", story.id);
    }
    Ok(())
}

fn list(projects_dir: &Path, project: Option<&str>, json: bool) -> anyhow::Result<()> {
    let stories = Story::list(projects_dir, project).context("failed to list stories")?;

    if json {
        print_json(&stories)?;
        return Ok(());
    }
    if stories.is_empty() {
        println!("No stories.");
        return Ok(());
    }
    let rows = stories
        .iter()
        .map(|s| vec![s.id.clone(), s.project.clone(), s.stage.to_string()])
        .collect();
    print_table(&["ID", "PROJECT", "STAGE"], rows);
    Ok(())
}

fn move_story(projects_dir: &Path, id: &str, stage: &str, json: bool) -> anyhow::Result<()> {
    let stage = stage.parse()?;
    let story = Story::move_to(projects_dir, id, stage)
        .with_context(|| format!("failed to move story '{id}'"))?;

    if json {
        print_json(&story)?;
    } else {
        println!("Moved '{}' to {}", story.id, story.stage);
    }
    Ok(())
}

fn delete(projects_dir: &Path, id: &str, force: bool, json: bool) -> anyhow::Result<()> {
    if !force {
        anyhow::bail!("refusing to delete story '{id}' without --force");
    }
    let story =
        Story::delete(projects_dir, id).with_context(|| format!("failed to delete story '{id}'"))?;

    if json {
        print_json(&story)?;
    } else {
        println!("Deleted story '{}' from project '{}'", story.id, story.project);
    }
    Ok(())
}

fn workspace(
    root: &Path,
    config: &Config,
    id: &str,
    suffix: Option<&str>,
    template: &str,
    no_kanban: bool,
    json: bool,
) -> anyhow::Result<()> {
    let projects_dir = config.projects_dir(root)?;
    let story = Story::find(&projects_dir, id).with_context(|| format!("failed to find story '{id}'"))?;
    let story_ref = story
        .to_ref(&projects_dir)
        .with_context(|| format!("failed to load project '{}'", story.project))?;

    let base_dir = config.workspaces_dir(root)?;
    let name = naming::workspace_name(&base_dir, id, suffix)?;
    let kanban = if no_kanban {
        None
    } else {
        let board = filter_core::paths::project_kanban_dir(&projects_dir, &story.project);
        board.is_dir().then_some(KanbanSource::Shared(board))
    };

    let params = BuildParams {
        name: name.clone(),
        base_dir,
        templates_dir: config.templates_dir(root)?,
        template: template.to_string(),
        story: Some(story_ref),
        kanban,
        ports: config.ports.clone(),
    };
    let runner = SystemRunner;
    let built = Workspace::build(&params, &runner)
        .with_context(|| format!("failed to build workspace '{name}' for story '{id}'"))?;

    let repo = built.workspace.repo_dir();
    let push_access = repo
        .join(".git")
        .exists()
        .then(|| git::has_push_access(&runner, &repo));

    print_built(&built, json)?;
    if !json {
        match push_access {
            Some(true) => println!("Push access to origin: yes"),
            Some(false) => println!("Push access to origin: no (you may need to fork first)"),
            None => {}
        }
    }
    Ok(())
}
