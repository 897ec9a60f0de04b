//! `docker compose` invocations and compose-file port rewriting.
//!
//! Every compose command runs with the workspace root as its working
//! directory so compose picks up `docker-compose.yml` from there.

use crate::error::{FilterError, Result};
use crate::process::CommandRunner;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const DOCKER: &str = "docker";

fn compose(runner: &dyn CommandRunner, dir: &Path, args: &[&str]) -> Result<String> {
    let mut full = vec!["compose"];
    full.extend_from_slice(args);
    let out = runner.run(DOCKER, &full, dir)?.check(DOCKER, &full)?;
    Ok(out.stdout)
}

pub fn up(runner: &dyn CommandRunner, dir: &Path) -> Result<()> {
    compose(runner, dir, &["up", "-d"]).map(|_| ())
}

/// `docker compose down`, also removing named volumes when `volumes` is set.
pub fn down(runner: &dyn CommandRunner, dir: &Path, volumes: bool) -> Result<()> {
    let args: &[&str] = if volumes { &["down", "-v"] } else { &["down"] };
    compose(runner, dir, args).map(|_| ())
}

/// IDs of the project's running containers.
pub fn running_containers(runner: &dyn CommandRunner, dir: &Path) -> Result<Vec<String>> {
    let stdout = compose(runner, dir, &["ps", "-q"])?;
    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Last lines of the project's logs, for diagnosing a failed `up`.
pub fn logs_tail(runner: &dyn CommandRunner, dir: &Path, lines: usize) -> Result<String> {
    let tail = lines.to_string();
    compose(runner, dir, &["logs", "--no-color", "--tail", &tail])
}

/// Run `cmd` in `service` attached to the terminal and return its exit code.
pub fn exec(runner: &dyn CommandRunner, dir: &Path, service: &str, cmd: &[&str]) -> Result<i32> {
    let mut args = vec!["compose", "exec", service];
    args.extend_from_slice(cmd);
    runner.run_interactive(DOCKER, &args, dir)
}

// ---------------------------------------------------------------------------
// Port rewriting
// ---------------------------------------------------------------------------

/// Container side of a compose port entry: `"8001:8000"`, `"127.0.0.1:8001:8000"`,
/// `"8000"`, `8000` or the long `{ target: 8000 }` form.
fn container_port(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => s.rsplit(':').next().map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        Value::Mapping(m) => m.get("target").and_then(|t| match t {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
}

/// Point each service's published port at the host port recorded for it,
/// keeping the container port of its first existing mapping. Services in
/// `ports` that the file does not define, or that publish nothing, are left
/// untouched.
pub fn rewrite_ports(compose_file: &Path, ports: &BTreeMap<String, u16>) -> Result<()> {
    let invalid = |reason: &str| FilterError::InvalidCompose {
        path: compose_file.to_path_buf(),
        reason: reason.to_string(),
    };

    let data = std::fs::read_to_string(compose_file)?;
    let mut doc: Value = serde_yaml::from_str(&data)?;
    let services = doc
        .get_mut("services")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| invalid("missing 'services' mapping"))?;

    for (service, host_port) in ports {
        let Some(def) = services.get_mut(service.as_str()) else {
            tracing::debug!(service = %service, "no such compose service; port not rewritten");
            continue;
        };
        let Some(def) = def.as_mapping_mut() else {
            return Err(invalid(&format!("service '{service}' is not a mapping")));
        };
        let target = def
            .get("ports")
            .and_then(Value::as_sequence)
            .and_then(|seq| seq.first())
            .and_then(container_port);
        let Some(target) = target else {
            tracing::debug!(service = %service, "service publishes no ports");
            continue;
        };
        def.insert(
            Value::from("ports"),
            Value::Sequence(vec![Value::from(format!("{host_port}:{target}"))]),
        );
    }

    let out = serde_yaml::to_string(&doc)?;
    crate::io::atomic_write(compose_file, out.as_bytes())
}

/// Host ports currently published in the compose file, keyed by service.
pub fn published_ports(compose_file: &Path) -> Result<BTreeMap<String, u16>> {
    let data = std::fs::read_to_string(compose_file)?;
    let doc: Value = serde_yaml::from_str(&data)?;
    let mut out = BTreeMap::new();
    let Some(services) = doc.get("services").and_then(Value::as_mapping) else {
        return Ok(out);
    };
    for (name, def) in services {
        let (Some(name), Some(first)) = (
            name.as_str(),
            def.get("ports")
                .and_then(Value::as_sequence)
                .and_then(|s| s.first())
                .and_then(Value::as_str),
        ) else {
            continue;
        };
        let mut parts = first.rsplit(':');
        parts.next();
        if let Some(host) = parts.next().and_then(|h| h.parse::<u16>().ok()) {
            out.insert(name.to_string(), host);
        }
    }
    Ok(out)
}
