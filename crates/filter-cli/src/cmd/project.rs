use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use filter_core::{
    config::Config,
    kanban,
    project::{NewProject, Project},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// Create a project with its own kanban board
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Repository cloned into story workspaces
        #[arg(long)]
        git_url: Option<String>,
        /// Maintainer name or email (repeatable)
        #[arg(long = "maintainer")]
        maintainers: Vec<String>,
        /// Skip creating the kanban board
        #[arg(long)]
        no_kanban: bool,
    },
    /// List projects
    List,
    /// Show a project and its board
    Show { name: String },
    /// Delete a project and everything under it
    Delete {
        name: String,
        /// Required: deletion removes every story on the board
        #[arg(long)]
        force: bool,
    },
}

pub fn run(root: &Path, subcmd: ProjectSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let projects_dir = config.projects_dir(root)?;
    match subcmd {
        ProjectSubcommand::Create {
            name,
            description,
            git_url,
            maintainers,
            no_kanban,
        } => {
            let seed = if no_kanban {
                None
            } else {
                Some(config.kanban_dir(root)?)
            };
            let opts = NewProject {
                description,
                git_url,
                maintainers,
                kanban_seed: seed,
            };
            create(&projects_dir, &name, opts, json)
        }
        ProjectSubcommand::List => list(&projects_dir, json),
        ProjectSubcommand::Show { name } => show(&projects_dir, &name, json),
        ProjectSubcommand::Delete { name, force } => delete(&projects_dir, &name, force, json),
    }
}

fn create(projects_dir: &Path, name: &str, opts: NewProject, json: bool) -> anyhow::Result<()> {
    let project = Project::create(projects_dir, name, opts)
        .with_context(|| format!("failed to create project '{name}'"))?;

    if json {
        print_json(&project)?;
    } else {
        println!(
            "Created project '{}' (story prefix '{}') at {}",
            project.name,
            project.prefix,
            project.dir(projects_dir).display()
        );
        println!("Next: filter story create --project {} --description \"...\"", project.name);
    }
    Ok(())
}

fn list(projects_dir: &Path, json: bool) -> anyhow::Result<()> {
    let projects = Project::list(projects_dir).context("failed to list projects")?;

    if json {
        print_json(&projects)?;
        return Ok(());
    }
    if projects.is_empty() {
        println!("No projects. Create one with: filter project create <name>");
        return Ok(());
    }
    let rows = projects
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.prefix.clone(),
                or_dash(p.git_url.as_deref().unwrap_or("")),
                or_dash(&p.description),
            ]
        })
        .collect();
    print_table(&["NAME", "PREFIX", "GIT URL", "DESCRIPTION"], rows);
    Ok(())
}

fn show(projects_dir: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let project = Project::load(projects_dir, name)
        .with_context(|| format!("failed to load project '{name}'"))?;
    let cards = kanban::cards(&project.kanban_dir(projects_dir))
        .with_context(|| format!("failed to read board for '{name}'"))?;

    if json {
        print_json(&serde_json::json!({
            "project": project,
            "stories": cards,
        }))?;
        return Ok(());
    }

    println!("Project:     {}", project.name);
    println!("Prefix:      {}", project.prefix);
    println!("Description: {}", or_dash(&project.description));
    println!("Git URL:     {}", or_dash(project.git_url.as_deref().unwrap_or("")));
    if !project.maintainers.is_empty() {
        println!("Maintainers: {}", project.maintainers.join(", "));
    }
    println!("Created:     {}", project.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("\nBoard:");
    for stage in kanban::Stage::ALL {
        let ids: Vec<&str> = cards
            .iter()
            .filter(|c| c.stage == stage)
            .map(|c| c.id.as_str())
            .collect();
        println!("  {:<12} {}", stage.as_str(), or_dash(&ids.join(", ")));
    }
    Ok(())
}

fn delete(projects_dir: &Path, name: &str, force: bool, json: bool) -> anyhow::Result<()> {
    if !force {
        anyhow::bail!("refusing to delete project '{name}' and its board without --force");
    }
    Project::delete(projects_dir, name)
        .with_context(|| format!("failed to delete project '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "deleted": name }))?;
    } else {
        println!("Deleted project '{name}'");
    }
    Ok(())
}
