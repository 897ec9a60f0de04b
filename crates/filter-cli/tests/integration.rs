#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn filter(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("filter").unwrap();
    cmd.current_dir(dir.path())
        .env("FILTER_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_repo(dir: &TempDir) {
    filter(dir)
        .args(["init", "--project-name", "order-router"])
        .assert()
        .success();
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

// ---------------------------------------------------------------------------
// filter init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_filter_dir() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);

    let root = dir.path();
    assert!(root.join(".filter/config.yaml").is_file());
    assert!(root.join(".filter/metadata.yaml").is_file());
    for stage in ["stories", "planning", "in-progress", "testing", "pr", "complete", "prompts"] {
        assert!(root.join(".filter/kanban").join(stage).join(".gitkeep").is_file());
    }
    for template in ["default", "minimal", "python"] {
        assert!(root
            .join(".filter/templates")
            .join(template)
            .join("docker-compose.yml.j2")
            .is_file());
    }
    let gitignore = std::fs::read_to_string(root.join(".gitignore")).unwrap();
    assert!(gitignore.lines().any(|l| l == "/workspaces/"));

    let meta = std::fs::read_to_string(root.join(".filter/metadata.yaml")).unwrap();
    assert!(meta.contains("project_name: order-router"));
    assert!(meta.contains("prefix: orrod"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    let custom = dir.path().join(".filter/templates/minimal/env.j2");
    std::fs::write(&custom, "CUSTOM=1\n").unwrap();

    filter(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
    assert_eq!(std::fs::read_to_string(&custom).unwrap(), "CUSTOM=1\n");

    filter(&dir).args(["init", "--force"]).assert().success();
    assert_ne!(std::fs::read_to_string(&custom).unwrap(), "CUSTOM=1\n");
}

#[test]
fn config_validate_after_init() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_without_init_fails() {
    let dir = TempDir::new().unwrap();
    filter(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("templates_directory"));
}

// ---------------------------------------------------------------------------
// filter project
// ---------------------------------------------------------------------------

#[test]
fn project_create_list_show_delete() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);

    filter(&dir)
        .args([
            "project",
            "create",
            "ib-stream",
            "--description",
            "Market data",
            "--maintainer",
            "dev@example.com",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("prefix 'ibstr'"));
    assert!(dir.path().join("projects/ib-stream/project.yaml").is_file());
    assert!(dir.path().join("projects/ib-stream/kanban/stories").is_dir());

    filter(&dir)
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ib-stream"))
        .stdout(predicate::str::contains("ibstr"));

    filter(&dir)
        .args(["project", "show", "ib-stream"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Market data"))
        .stdout(predicate::str::contains("in-progress"));

    filter(&dir)
        .args(["project", "delete", "ib-stream"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    filter(&dir)
        .args(["project", "delete", "ib-stream", "--force"])
        .assert()
        .success();
    assert!(!dir.path().join("projects/ib-stream").exists());
}

#[test]
fn project_create_duplicate_fails() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir).args(["project", "create", "demo"]).assert().success();
    filter(&dir)
        .args(["project", "create", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn project_create_invalid_name_fails() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["project", "create", "bad name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid project name"));
}

// ---------------------------------------------------------------------------
// filter story
// ---------------------------------------------------------------------------

#[test]
fn story_lifecycle() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir).args(["project", "create", "ib-stream"]).assert().success();

    filter(&dir)
        .args([
            "story",
            "create",
            "--project",
            "ib-stream",
            "--description",
            "Replay historical ticks",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ibstr-1"));
    filter(&dir)
        .args(["story", "create", "--project", "ib-stream", "--description", "Second"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ibstr-2"));

    let card = dir.path().join("projects/ib-stream/kanban/stories/ibstr-1.md");
    let body = std::fs::read_to_string(&card).unwrap();
    assert!(body.contains("Replay historical ticks"));

    filter(&dir)
        .args(["story", "move", "ibstr-1", "in-progress"])
        .assert()
        .success();
    assert!(!card.exists());
    assert!(dir
        .path()
        .join("projects/ib-stream/kanban/in-progress/ibstr-1.md")
        .is_file());

    filter(&dir)
        .args(["story", "list", "--project", "ib-stream"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ibstr-1"))
        .stdout(predicate::str::contains("in-progress"));

    filter(&dir)
        .args(["story", "move", "ibstr-1", "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid stage 'done'"));

    filter(&dir)
        .args(["story", "delete", "ibstr-2", "--force"])
        .assert()
        .success();
    filter(&dir)
        .args(["story", "delete", "ibstr-2", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("story not found"));
}

#[test]
fn story_create_unknown_project_fails() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["story", "create", "--project", "ghost", "--description", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project not found: ghost"));
}

#[test]
fn story_workspace_without_repository() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir).args(["project", "create", "demo"]).assert().success();
    filter(&dir)
        .args(["story", "create", "--project", "demo", "--description", "x"])
        .assert()
        .success();

    filter(&dir)
        .args(["story", "workspace", "demo-1", "--template", "minimal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo-1-ws-1"));
    filter(&dir)
        .args(["story", "workspace", "demo-1", "--template", "minimal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo-1-ws-2"));

    let ws = dir.path().join("workspaces/demo-1-ws-1");
    assert!(ws.join("workspace/kanban/stories/demo-1.md").is_file());
    let env = std::fs::read_to_string(ws.join("workspace/.env")).unwrap();
    assert!(env.contains("STORY_ID=demo-1"));
    assert!(env.contains("PROJECT_NAME=demo"));
    assert!(!ws.join("workspace/repo").exists());
}

// ---------------------------------------------------------------------------
// filter template
// ---------------------------------------------------------------------------

#[test]
fn template_list_shows_builtins() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default"))
        .stdout(predicate::str::contains("minimal"))
        .stdout(predicate::str::contains("postgres,jupyter"));
}

#[test]
fn template_render_with_vars_and_values() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("greeting.j2"),
        "{{ greeting }}, {{ name }}! port={{ port }}\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("values.yaml"), "greeting: Hello\nport: 8001\nname: nobody\n")
        .unwrap();

    filter(&dir)
        .args([
            "template",
            "render",
            "greeting.j2",
            "--values",
            "values.yaml",
            "--var",
            "name=demo",
        ])
        .assert()
        .success()
        .stdout("Hello, demo! port=8001\n");
}

#[test]
fn template_render_undefined_variable_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("t.j2"), "{{ missing }}").unwrap();
    filter(&dir)
        .args(["template", "render", "t.j2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("t.j2"));
}

#[test]
fn template_render_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    filter(&dir)
        .args(["template", "render", "nope.j2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("template not found"));
}

// ---------------------------------------------------------------------------
// filter workspace
// ---------------------------------------------------------------------------

#[test]
fn workspace_create_status_delete() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);

    filter(&dir)
        .args(["workspace", "create", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created workspace 'demo'"));

    let ws = dir.path().join("workspaces/demo");
    assert!(ws.join("Dockerfile").is_file());
    assert!(ws.join("docker-compose.yml").is_file());
    assert!(ws.join("workspace.yaml").is_file());
    assert!(ws.join("workspace/.env").is_file());
    assert!(ws.join("workspace/kanban/stories").is_dir());

    let status = stdout_json(filter(&dir).args(["workspace", "status", "demo"]));
    assert_eq!(status["workspace"]["name"], "demo");
    assert_eq!(status["workspace"]["template"], "default");
    assert!(status["workspace"]["ports"].as_object().unwrap().is_empty());

    let list = stdout_json(filter(&dir).args(["workspace", "list"]));
    assert_eq!(list.as_array().unwrap().len(), 1);

    filter(&dir)
        .args(["workspace", "delete", "demo"])
        .assert()
        .success();
    assert!(!ws.exists());
    assert!(dir.path().join(".filter/kanban/stories").is_dir());

    filter(&dir)
        .args(["workspace", "delete", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workspace not found: demo"));
}

#[test]
fn workspace_create_duplicate_fails() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["workspace", "create", "demo", "--template", "minimal"])
        .assert()
        .success();
    filter(&dir)
        .args(["workspace", "create", "demo", "--template", "minimal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn workspace_create_unknown_template_leaves_nothing() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["workspace", "create", "demo", "--template", "rust"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("template not found"));
    assert!(!dir.path().join("workspaces/demo").exists());
}

#[test]
fn workspace_create_invalid_name_fails() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["workspace", "create", "has space"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid workspace_name"));
}

#[test]
fn workspace_delete_force_removes_leftover_without_manifest() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    let leftover = dir.path().join("workspaces/half-built");
    std::fs::create_dir_all(leftover.join("workspace")).unwrap();
    std::fs::write(leftover.join("Dockerfile"), "FROM debian\n").unwrap();

    filter(&dir)
        .args(["workspace", "delete", "half-built", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted workspace 'half-built'"));
    assert!(!leftover.exists());
}

#[test]
fn workspace_list_skips_corrupt_manifest() {
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    filter(&dir)
        .args(["workspace", "create", "good", "--template", "minimal"])
        .assert()
        .success();
    let bad = dir.path().join("workspaces/bad");
    std::fs::create_dir_all(&bad).unwrap();
    std::fs::write(bad.join("workspace.yaml"), "name: [unclosed\n").unwrap();

    let list = stdout_json(filter(&dir).args(["workspace", "list"]));
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["workspace"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["good"]);

    filter(&dir)
        .args(["workspace", "status", "bad"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("workspaces/bad/workspace.yaml"));
}
