use clap::{ArgAction, Parser, Subcommand};
use filter_cli::cmd::{
    self, config::ConfigSubcommand, project::ProjectSubcommand, story::StorySubcommand,
    template::TemplateSubcommand, workspace::WorkspaceSubcommand,
};
use filter_cli::root;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "filter",
    about = "Kanban workflows and isolated Docker workspaces for projects and stories",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .filter/ or .git/)
    #[arg(long, global = true, env = "FILTER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up .filter/ in the current repository
    Init {
        /// Project name recorded in metadata (default: directory name)
        #[arg(long)]
        project_name: Option<String>,
        /// Story id prefix (default: derived from the project name)
        #[arg(long)]
        prefix: Option<String>,
        /// Rewrite metadata and built-in templates
        #[arg(long)]
        force: bool,
    },

    /// Show or validate .filter/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Manage stories on project boards
    Story {
        #[command(subcommand)]
        subcommand: StorySubcommand,
    },

    /// List and render workspace templates
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Build and run Docker workspaces
    #[command(alias = "ws")]
    Workspace {
        #[command(subcommand)]
        subcommand: WorkspaceSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            project_name,
            prefix,
            force,
        } => cmd::init::run(
            &root,
            project_name.as_deref(),
            prefix.as_deref(),
            force,
            cli.json,
        ),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Project { subcommand } => cmd::project::run(&root, subcommand, cli.json),
        Commands::Story { subcommand } => cmd::story::run(&root, subcommand, cli.json),
        Commands::Template { subcommand } => cmd::template::run(&root, subcommand, cli.json),
        Commands::Workspace { subcommand } => cmd::workspace::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
