use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use filter_core::{
    config::Config,
    template::{self, Template},
};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// List workspace templates
    List,
    /// Render a template file to stdout
    Render {
        file: PathBuf,
        /// Template variable (repeatable: --var name=demo --var app_port=8001)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// YAML mapping of variables; --var entries override it
        #[arg(long)]
        values: Option<PathBuf>,
    },
}

pub fn run(root: &Path, subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TemplateSubcommand::List => list(root, json),
        TemplateSubcommand::Render { file, vars, values } => {
            render(&file, &vars, values.as_deref(), json)
        }
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let dir = config.templates_dir(root)?;
    let templates = Template::list(&dir)
        .with_context(|| format!("failed to list templates in {}", dir.display()))?;

    if json {
        print_json(&templates)?;
        return Ok(());
    }
    if templates.is_empty() {
        println!("No templates in {}. Run: filter init", dir.display());
        return Ok(());
    }
    let rows = templates
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                or_dash(&t.meta.features.join(",")),
                or_dash(&t.meta.description),
            ]
        })
        .collect();
    print_table(&["NAME", "FEATURES", "DESCRIPTION"], rows);
    Ok(())
}

fn parse_var(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid --var '{raw}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("invalid --var '{raw}': empty key");
    }
    Ok((key.to_string(), value.to_string()))
}

fn render(file: &Path, vars: &[String], values: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let mut ctx = template::Context::new();
    if let Some(values) = values {
        let data = std::fs::read_to_string(values)
            .with_context(|| format!("failed to read {}", values.display()))?;
        let loaded: template::Context = serde_yaml::from_str(&data)
            .with_context(|| format!("{} is not a YAML mapping", values.display()))?;
        ctx.extend(loaded);
    }
    for raw in vars {
        let (k, v) = parse_var(raw)?;
        ctx.insert(k, v.into());
    }

    let out = template::render(file, &ctx)
        .with_context(|| format!("failed to render {}", file.display()))?;
    if json {
        print_json(&serde_json::json!({ "file": file, "output": out }))?;
    } else {
        print!("{out}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_splits_on_first_equals() {
        assert_eq!(
            parse_var("url=postgres://u:p@h/db?x=1").unwrap(),
            ("url".to_string(), "postgres://u:p@h/db?x=1".to_string())
        );
    }

    #[test]
    fn var_without_equals_is_rejected() {
        assert!(parse_var("name").is_err());
        assert!(parse_var("=value").is_err());
    }
}
