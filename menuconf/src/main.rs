#[macro_use]
extern crate log;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use kconfig_tree::{ConfigNode, NodeValue, data::find_by_name};
use menuconf::{
    Session, SessionEvent,
    config::{CONFIG_FILE_NAME, MenuconfigConfig, ResolvedConfig, schema_json},
    host::SessionHost,
    listener::next_tree,
};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

/// How long to wait for the backend's answer to an edit or a reload.
const SETTLE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "menuconf", version, about = "Edit Kconfig options through a confserver backend")]
struct Cli {
    /// Project root. Defaults to the current directory.
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,
    /// Configuration file. Defaults to `.menuconfig.toml` in the workspace.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Seconds to wait for the backend.
    #[arg(long, global = true, default_value_t = 120)]
    timeout: u64,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand)]
enum SubCommands {
    /// Print the option tree.
    Show {
        /// Include options that are currently hidden.
        #[arg(long)]
        all: bool,
        /// Print the tree as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Set options, e.g. `menuconf set LOG_DEFAULT_LEVEL_DEBUG=y`.
    Set {
        #[arg(required = true, value_name = "NAME=VALUE")]
        assignments: Vec<String>,
        /// Write the result to the configuration file.
        #[arg(long)]
        save: bool,
    },
    /// Reset the configuration to Kconfig defaults.
    Defaults,
    /// Print the JSON schema of the configuration file.
    Schema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let SubCommands::Schema = cli.command {
        println!("{}", schema_json()?);
        return Ok(());
    }

    let workspace = match cli.workspace {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("workspace {} not found", workspace.display()))?;
    let config_path = cli
        .config
        .unwrap_or_else(|| workspace.join(CONFIG_FILE_NAME));
    let config = MenuconfigConfig::load(&config_path)?.resolve(&workspace)?;
    let timeout = Duration::from_secs(cli.timeout);

    let (tx, mut events) = unbounded_channel();
    let host = SessionHost::new();
    config.backend.print_cmd();
    let session = tokio::time::timeout(timeout, host.init(&config, Arc::new(tx)))
        .await
        .map_err(|_| anyhow!("backend did not answer within {}s", cli.timeout))??;
    // Notifications up to readiness are stale now.
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ProtocolError(message) = event {
            eprintln!("{}", message.red());
        }
    }

    let result = match cli.command {
        SubCommands::Show { all, json } => show(&session, all, json),
        SubCommands::Set { assignments, save } => {
            set(&session, &mut events, &assignments, save).await
        }
        SubCommands::Defaults => defaults(&session, &mut events, &config).await,
        SubCommands::Schema => Ok(()),
    };

    host.dispose().await;
    if tokio::time::timeout(Duration::from_secs(5), session.closed())
        .await
        .is_err()
    {
        warn!("backend did not exit after its input was closed");
    }
    result
}

fn show(session: &Session, all: bool, json: bool) -> anyhow::Result<()> {
    let tree = session.tree();
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&tree, 0, all);
    }
    Ok(())
}

fn print_tree(nodes: &[ConfigNode], depth: usize, all: bool) {
    for node in nodes {
        if !node.visible && !all {
            continue;
        }
        let indent = "  ".repeat(depth);
        if !node.is_editable() {
            println!("{indent}{}", node.label().bold());
        } else {
            let label = if node.visible {
                node.label().normal()
            } else {
                node.label().dimmed()
            };
            let range = node
                .range
                .map(|r| format!(" [{}..{}]", r.min(), r.max()))
                .unwrap_or_default();
            println!(
                "{indent}{label} {} = {}{}",
                format!("({})", node.name).dimmed(),
                value_text(&node.value).cyan(),
                range.dimmed()
            );
        }
        print_tree(&node.children, depth + 1, all);
    }
}

fn value_text(value: &NodeValue) -> String {
    if value.is_unset() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

async fn set(
    session: &Session,
    events: &mut UnboundedReceiver<SessionEvent>,
    assignments: &[String],
    save: bool,
) -> anyhow::Result<()> {
    let mut names = Vec::new();
    for assignment in assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            bail!("expected NAME=VALUE, got `{assignment}`");
        };
        session.set_value_by_name(name.trim(), value)?;
        names.push(name.trim().to_string());
    }

    let tree = next_tree(events, SETTLE, print_error)
        .await?
        .unwrap_or_else(|| session.tree());
    for name in &names {
        if let Some(node) = find_by_name(&tree, name) {
            println!("{} = {}", node.name, value_text(&node.value).cyan());
        }
    }

    if save {
        session.save()?;
        println!(
            "{}",
            format!("Saved to {}", session.config_file().display()).green()
        );
    } else {
        session.load(true)?;
        println!("{}", "Not saved, changes discarded".yellow());
    }
    Ok(())
}

async fn defaults(
    session: &Session,
    events: &mut UnboundedReceiver<SessionEvent>,
    config: &ResolvedConfig,
) -> anyhow::Result<()> {
    let Some(reconfigure) = &config.reconfigure else {
        bail!("no reconfigure command configured");
    };

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}% {msg}")?.progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    let flow = session.set_defaults(reconfigure, |p| {
        bar.inc(p.increment.into());
        bar.set_message(p.message);
    });
    tokio::select! {
        outcome = flow => {
            if let Err(e) = outcome {
                bar.abandon_with_message("failed".red().to_string());
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            bar.abandon_with_message("cancelled".yellow().to_string());
            return Ok(());
        }
    }
    bar.finish();

    if next_tree(events, SETTLE, print_error).await?.is_none() {
        info!("reloaded configuration matches the previous values");
    }
    println!("{}", "Loaded default values".green());
    Ok(())
}

fn print_error(message: String) {
    eprintln!("{}", message.red());
}
