use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formset_engine::{FormEvent, FormsetController, FormsetTree, OfflineTransport, Transport, collect_markup, parse_description_file};
use formset_util::{ClientConfig, HttpTransport, redact_sensitive};
use serde_json::{Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Mount, inspect and replay form descriptions.
#[derive(Parser, Debug)]
#[command(name = "formset", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount a description and report configuration errors
    Check {
        /// Description file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Print the df-* attributes of every conditioned element
        #[arg(long)]
        markup: bool,
    },
    /// Print the submission payload of a freshly mounted tree
    Payload {
        #[arg(short, long)]
        file: PathBuf,

        /// Initial data (YAML or JSON object, dotted keys allowed)
        #[arg(long)]
        initial: Option<PathBuf>,
    },
    /// Replay a script of user events and print one report per event
    Replay {
        #[arg(short, long)]
        file: PathBuf,

        /// Event script (YAML list of set/click/add/remove/step/reset)
        #[arg(short, long)]
        script: PathBuf,

        #[arg(long)]
        initial: Option<PathBuf>,

        /// Deliver submissions to the configured endpoint instead of accepting them offline
        #[arg(long)]
        submit: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Check { file, markup } => check(&file, markup),
        Command::Payload { file, initial } => payload(&file, initial.as_deref()),
        Command::Replay {
            file,
            script,
            initial,
            submit,
        } => {
            let tree = mount(&file, initial.as_deref())?;
            let events = load_script(&script)?;
            if submit {
                let config = ClientConfig::load().context("Failed to load client config")?;
                let transport = HttpTransport::from_config(&config)?;
                info!(endpoint = %redact_sensitive(transport.endpoint().as_str()), "submitting to endpoint");
                replay(FormsetController::new(tree, transport), &events).await
            } else {
                replay(FormsetController::new(tree, OfflineTransport), &events).await
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn check(file: &Path, markup: bool) -> Result<()> {
    let tree = mount(file, None)?;
    println!("{}: ok", file.display());
    if markup {
        for (path, conditions) in collect_markup(tree.root()) {
            println!("{path}: {}", conditions.render());
        }
    }
    tree.unmount();
    Ok(())
}

fn payload(file: &Path, initial: Option<&Path>) -> Result<()> {
    let tree = mount(file, initial)?;
    println!("{}", serde_json::to_string_pretty(&tree.submission_payload())?);
    tree.unmount();
    Ok(())
}

async fn replay<T: Transport>(mut controller: FormsetController<T>, events: &[FormEvent]) -> Result<()> {
    for (step, event) in events.iter().enumerate() {
        let line = match controller.dispatch(event).await {
            Ok(report) => json!({ "step": step, "event": event, "report": report }),
            Err(rejection) => {
                warn!(step, %rejection, "event rejected");
                json!({ "step": step, "event": event, "rejected": rejection.to_string() })
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    let payload = controller.tree().submission_payload();
    println!("{}", serde_json::to_string(&json!({ "payload": payload }))?);
    controller.unmount();
    Ok(())
}

fn mount(file: &Path, initial: Option<&Path>) -> Result<FormsetTree> {
    let description = parse_description_file(file)?;
    let initial = initial.map(read_document).transpose()?;
    FormsetTree::mount(&description, initial.as_ref()).with_context(|| format!("Failed to mount {}", file.display()))
}

/// Reads a YAML or JSON document.
fn read_document(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid document in {}", path.display()))
}

fn load_script(path: &Path) -> Result<Vec<FormEvent>> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))?;
    FormEvent::parse_script(&content).with_context(|| format!("Invalid event script in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    const DESCRIPTION: &str = "root:\n  type: form\n  members:\n    name: {}\n    send: { widget: button, action: submit -> proceed }\n";

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_arguments_parse() {
        let cli = Cli::try_parse_from(["formset", "replay", "-f", "form.yaml", "-s", "script.yaml", "--submit"]).expect("parse");
        match cli.command {
            Command::Replay { script, submit, initial, .. } => {
                assert_eq!(script, PathBuf::from("script.yaml"));
                assert!(submit);
                assert!(initial.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn mount_applies_initial_data() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let description = temp_dir.path().join("form.yaml");
        let initial = temp_dir.path().join("initial.json");
        fs::write(&description, DESCRIPTION).expect("write description");
        fs::write(&initial, r#"{"name": "Ada"}"#).expect("write initial");

        let tree = mount(&description, Some(&initial)).expect("mount");
        assert_eq!(tree.submission_payload().formset_data, json!({"name": "Ada"}));
    }

    #[test]
    fn scripts_load_events() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let script = temp_dir.path().join("script.yaml");
        fs::write(&script, "- set: { path: name, value: Ada }\n- click: { path: send }\n- reset\n").expect("write script");
        let events = load_script(&script).expect("events");
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], FormEvent::Click { path: "send".into() });
        assert_eq!(events[2], FormEvent::Reset);
    }

    #[tokio::test]
    async fn replay_runs_offline() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let description = temp_dir.path().join("form.yaml");
        fs::write(&description, DESCRIPTION).expect("write description");
        let tree = mount(&description, None).expect("mount");
        let events = vec![
            FormEvent::Set {
                path: "name".into(),
                value: json!("Ada"),
            },
            FormEvent::Click { path: "send".into() },
            FormEvent::Click { path: "missing".into() },
        ];
        replay(FormsetController::new(tree, OfflineTransport), &events).await.expect("replay");
    }
}
