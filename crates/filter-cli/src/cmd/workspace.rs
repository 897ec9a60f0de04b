use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use filter_core::{
    config::Config,
    process::{self, CommandRunner, SystemRunner},
    workspace::{BuildParams, Built, KanbanSource, Workspace, WorkspaceState},
};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_TEMPLATE: &str = "default";

#[derive(Subcommand)]
pub enum WorkspaceSubcommand {
    /// Build a workspace directory from a template
    Create {
        name: String,
        #[arg(long, default_value = DEFAULT_TEMPLATE)]
        template: String,
        /// Don't link the repository board into the workspace
        #[arg(long)]
        no_kanban: bool,
    },
    /// List workspaces and their state
    List,
    /// Show one workspace
    Status { name: String },
    /// Allocate ports and start the containers
    Start { name: String },
    /// Stop the containers
    Stop { name: String },
    /// Remove the workspace directory
    Delete {
        name: String,
        /// Stop a running workspace first and remove its volumes
        #[arg(long)]
        force: bool,
    },
    /// Run a command inside a workspace container
    Exec {
        name: String,
        /// Compose service (default: exec_service from config)
        #[arg(long)]
        service: Option<String>,
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Open an interactive shell inside a workspace container
    Shell {
        name: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long, default_value = "bash")]
        shell: String,
    },
}

pub fn run(root: &Path, subcmd: WorkspaceSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let base_dir = config.workspaces_dir(root)?;
    let runner = SystemRunner;
    match subcmd {
        WorkspaceSubcommand::Create {
            name,
            template,
            no_kanban,
        } => create(root, &config, &name, &template, no_kanban, json),
        WorkspaceSubcommand::List => list(&base_dir, &runner, json),
        WorkspaceSubcommand::Status { name } => status(&base_dir, &runner, &name, json),
        WorkspaceSubcommand::Start { name } => start(&base_dir, &config, &runner, &name, json),
        WorkspaceSubcommand::Stop { name } => stop(&base_dir, &runner, &name, json),
        WorkspaceSubcommand::Delete { name, force } => {
            delete(&base_dir, &runner, &name, force, json)
        }
        WorkspaceSubcommand::Exec {
            name,
            service,
            command,
        } => {
            let service = service.unwrap_or_else(|| config.exec_service.clone());
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            exec(&base_dir, &runner, &name, &service, &args)
        }
        WorkspaceSubcommand::Shell {
            name,
            service,
            shell,
        } => {
            let service = service.unwrap_or_else(|| config.exec_service.clone());
            exec(&base_dir, &runner, &name, &service, &[shell.as_str()])
        }
    }
}

fn load(base_dir: &Path, name: &str) -> anyhow::Result<Workspace> {
    Workspace::load(base_dir, name).with_context(|| format!("failed to load workspace '{name}'"))
}

fn format_ports(ports: &BTreeMap<String, u16>) -> String {
    ports
        .iter()
        .map(|(service, port)| format!("{service}:{port}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

fn create(
    root: &Path,
    config: &Config,
    name: &str,
    template: &str,
    no_kanban: bool,
    json: bool,
) -> anyhow::Result<()> {
    let kanban = if no_kanban {
        None
    } else {
        let board = config.kanban_dir(root)?;
        board.is_dir().then_some(KanbanSource::Repository(board))
    };
    let params = BuildParams {
        name: name.to_string(),
        base_dir: config.workspaces_dir(root)?,
        templates_dir: config.templates_dir(root)?,
        template: template.to_string(),
        story: None,
        kanban,
        ports: config.ports.clone(),
    };
    let built = Workspace::build(&params, &SystemRunner)
        .with_context(|| format!("failed to build workspace '{name}'"))?;
    print_built(&built, json)
}

pub fn print_built(built: &Built, json: bool) -> anyhow::Result<()> {
    let ws = &built.workspace;
    if json {
        print_json(&serde_json::json!({
            "workspace": ws,
            "state": WorkspaceState::Created,
            "warnings": built.warnings,
        }))?;
        return Ok(());
    }
    println!(
        "Created workspace '{}' from template '{}' at {}",
        ws.name,
        ws.template,
        ws.root_path.display()
    );
    for w in &built.warnings {
        println!("  warning: {w}");
    }
    println!("Next: filter workspace start {}", ws.name);
    Ok(())
}

// ---------------------------------------------------------------------------
// list / status
// ---------------------------------------------------------------------------

fn list(base_dir: &Path, runner: &dyn CommandRunner, json: bool) -> anyhow::Result<()> {
    let workspaces = Workspace::list(base_dir)
        .with_context(|| format!("failed to list workspaces in {}", base_dir.display()))?;
    let with_state: Vec<(Workspace, WorkspaceState)> = workspaces
        .into_iter()
        .map(|ws| {
            let state = ws.state(runner);
            (ws, state)
        })
        .collect();

    if json {
        let items: Vec<serde_json::Value> = with_state
            .iter()
            .map(|(ws, state)| serde_json::json!({ "workspace": ws, "state": state }))
            .collect();
        print_json(&items)?;
        return Ok(());
    }
    if with_state.is_empty() {
        println!("No workspaces. Create one with: filter workspace create <name>");
        return Ok(());
    }
    let rows = with_state
        .iter()
        .map(|(ws, state)| {
            vec![
                ws.name.clone(),
                ws.template.clone(),
                state.to_string(),
                or_dash(&format_ports(&ws.ports)),
                or_dash(ws.story.as_ref().map(|s| s.story_id.as_str()).unwrap_or("")),
            ]
        })
        .collect();
    print_table(&["NAME", "TEMPLATE", "STATE", "PORTS", "STORY"], rows);
    Ok(())
}

fn status(base_dir: &Path, runner: &dyn CommandRunner, name: &str, json: bool) -> anyhow::Result<()> {
    let ws = load(base_dir, name)?;
    let state = ws.state(runner);

    if json {
        print_json(&serde_json::json!({ "workspace": ws, "state": state }))?;
        return Ok(());
    }
    println!("Workspace: {}", ws.name);
    println!("State:     {state}");
    println!("Template:  {}", ws.template);
    println!("Path:      {}", ws.root_path.display());
    println!("Ports:     {}", or_dash(&format_ports(&ws.ports)));
    if let Some(story) = &ws.story {
        println!("Story:     {} ({})", story.story_id, story.project_name);
        if let Some(url) = &story.git_url {
            println!("Repo:      {url}");
        }
    }
    println!("Created:   {}", ws.created_at.format("%Y-%m-%d %H:%M UTC"));
    if let Some(at) = ws.last_started_at {
        println!("Started:   {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// start / stop / delete
// ---------------------------------------------------------------------------

fn start(
    base_dir: &Path,
    config: &Config,
    runner: &dyn CommandRunner,
    name: &str,
    json: bool,
) -> anyhow::Result<()> {
    process::ensure_tool("docker")?;
    let mut ws = load(base_dir, name)?;
    ws.start(runner, config.ports.max_attempts)
        .with_context(|| format!("failed to start workspace '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "workspace": ws, "state": WorkspaceState::Running }))?;
        return Ok(());
    }
    println!("Started workspace '{name}'");
    for (service, port) in &ws.ports {
        println!("  {service:<10} localhost:{port}");
    }
    Ok(())
}

fn stop(base_dir: &Path, runner: &dyn CommandRunner, name: &str, json: bool) -> anyhow::Result<()> {
    let mut ws = load(base_dir, name)?;
    ws.stop(runner)
        .with_context(|| format!("failed to stop workspace '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "workspace": ws, "state": WorkspaceState::Stopped }))?;
    } else {
        println!("Stopped workspace '{name}'");
    }
    Ok(())
}

fn delete(
    base_dir: &Path,
    runner: &dyn CommandRunner,
    name: &str,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let ws = Workspace::open(base_dir, name)
        .with_context(|| format!("failed to load workspace '{name}'"))?;
    ws.delete(runner, force)
        .with_context(|| format!("failed to delete workspace '{name}'"))?;

    if json {
        print_json(&serde_json::json!({ "deleted": name }))?;
    } else {
        println!("Deleted workspace '{name}'");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// exec
// ---------------------------------------------------------------------------

fn exec(
    base_dir: &Path,
    runner: &dyn CommandRunner,
    name: &str,
    service: &str,
    cmd: &[&str],
) -> anyhow::Result<()> {
    process::ensure_tool("docker")?;
    let ws = load(base_dir, name)?;

    // The child shares the terminal and receives Ctrl-C itself.
    ctrlc::set_handler(|| {}).context("failed to install Ctrl-C handler")?;

    let code = ws
        .exec(runner, service, cmd)
        .with_context(|| format!("failed to exec in workspace '{name}'"))?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
