//! fwedit - Firewall rule revision editor
//!
//! Command-line front end for the editing core and the retry toolkit.
//!
//! # Usage
//!
//! ```bash
//! # Replay editor actions against fetched rules and print the save payload
//! fwedit edit rules.json actions.json
//! fwedit edit rules.json actions.json --diff --history
//!
//! # Show the waits of a backoff strategy
//! fwedit backoff                         # Configured strategy
//! fwedit backoff --max-delay 10000       # Fibonacci capped at 10s
//! fwedit backoff --fixed 500 --attempts 4
//!
//! # Poll until a command succeeds (Ctrl-C cancels)
//! fwedit retry -- curl -fsS https://example.com/health
//!
//! # Show the effective configuration, optionally writing it out in full
//! fwedit config
//! fwedit config --save
//! ```

use clap::{Parser, Subcommand};
use fwedit::audit;
use fwedit::config::{self, AppConfig};
use fwedit::core::diff::compute_diff;
use fwedit::core::editor::{
    Direction, RuleEditorAction, RuleEditorState, has_modified, init_rule_editor_state,
    rule_editor_state_to_rules,
};
use fwedit::core::firewall::{FirewallRules, MAX_RULES};
use fwedit::retry::{
    BackoffConfig, BackoffMethod, BackoffOverrides, attempt_with_backoff_cancellable,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fwedit")]
#[command(about = "Firewall rule revision editor and retry toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay editor actions against a rule set and print the save payload
    Edit {
        /// Rule set as returned by the API (JSON)
        rules: PathBuf,
        /// Editor actions to apply, in order (JSON array)
        actions: PathBuf,
        /// Print a diff between the fetched rules and the payload
        #[arg(long)]
        diff: bool,
        /// Print the status history of every rule slot
        #[arg(long)]
        history: bool,
    },
    /// Print the waits of a backoff strategy
    Backoff {
        /// Use a fixed delay (milliseconds) instead of Fibonacci
        #[arg(long, value_name = "MS", conflicts_with_all = ["max_delay", "offset"])]
        fixed: Option<u64>,
        /// Fibonacci ceiling (milliseconds)
        #[arg(long, value_name = "MS")]
        max_delay: Option<u64>,
        /// Fibonacci offset
        #[arg(long)]
        offset: Option<u32>,
        #[command(flatten)]
        limits: Limits,
    },
    /// Run a command until it exits successfully, backing off between attempts
    Retry {
        #[command(flatten)]
        limits: Limits,
        /// Command and arguments to run
        #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Show the effective configuration
    Config {
        /// Also write it to the config file, filling in every default
        #[arg(long)]
        save: bool,
    },
}

#[derive(clap::Args)]
struct Limits {
    /// Maximum number of attempts
    #[arg(long)]
    attempts: Option<u32>,
    /// Delay before the first attempt (milliseconds)
    #[arg(long, value_name = "MS")]
    initial_delay: Option<u64>,
}

impl Limits {
    fn overrides(&self) -> BackoffOverrides {
        BackoffOverrides {
            initial_delay_ms: self.initial_delay,
            max_attempts: self.attempts,
        }
    }
}

fn main() -> ExitCode {
    let _ = fwedit::utils::ensure_dirs();
    init_logging();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs to `fwedit.log` in the state directory, falling back to stderr
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(mut log_path) = fwedit::utils::get_state_dir() {
        log_path.push("fwedit.log");
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_cli(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config().await;

    match command {
        Commands::Edit {
            rules,
            actions,
            diff,
            history,
        } => edit(&config, &rules, &actions, diff, history).await?,
        Commands::Backoff {
            fixed,
            max_delay,
            offset,
            limits,
        } => {
            let backoff = match (fixed, max_delay, offset) {
                (Some(delay_ms), _, _) => BackoffConfig::Fixed { delay_ms },
                (None, None, None) => config.backoff.clone(),
                (None, max_delay_ms, offset) => BackoffConfig::Fibonacci {
                    max_delay_ms,
                    offset: offset.unwrap_or(0),
                },
            };
            let method = backoff.build(config.backoff_options(&limits.overrides()));
            print_schedule(method.as_ref());
        }
        Commands::Retry { limits, command } => {
            retry_command(&config, &limits.overrides(), &command).await?;
        }
        Commands::Config { save } => {
            if let Some(path) = config::config_path() {
                println!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                config::save_config(&config).await?;
                tracing::info!("Saved configuration");
            }
        }
    }
    Ok(())
}

async fn edit(
    config: &AppConfig,
    rules_path: &Path,
    actions_path: &Path,
    show_diff: bool,
    show_history: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rules: FirewallRules =
        serde_json::from_str(&tokio::fs::read_to_string(rules_path).await?)?;
    let actions: Vec<RuleEditorAction> =
        serde_json::from_str(&tokio::fs::read_to_string(actions_path).await?)?;

    let state = init_rule_editor_state(&rules).apply_all(&actions)?;
    let payload = rule_editor_state_to_rules(&state);
    let modified = has_modified(&state);

    let too_many = (payload.rule_count() > MAX_RULES).then(|| fwedit::Error::TooManyRules {
        count: payload.rule_count(),
        limit: MAX_RULES,
    });
    if config.enable_audit_log {
        audit::log_prepare_save(
            payload.inbound.len(),
            payload.outbound.len(),
            modified,
            too_many.as_ref().map(ToString::to_string),
        )
        .await;
    }
    if let Some(e) = too_many {
        return Err(e.into());
    }

    if show_history {
        print_history(&state);
    }
    if show_diff {
        match compute_diff(&rules, &payload)? {
            Some(diff) => print!("{diff}"),
            None => println!("No changes."),
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

fn print_history(state: &RuleEditorState) {
    println!("Mode: {}", state.mode);
    for direction in [Direction::Inbound, Direction::Outbound] {
        println!("{direction} policy: {}", state.policies.get(direction));
        for (idx, slot) in state.revisions.get(direction).iter().enumerate() {
            let statuses: Vec<&str> = slot.revisions().map(|r| r.status.as_ref()).collect();
            println!(
                "{direction}[{idx}] {}: {}",
                slot.current().rule.label.as_deref().unwrap_or("-"),
                statuses.join(" -> ")
            );
        }
    }
}

/// Attempts listed by `fwedit backoff` before the rest is summarised
const PRINTED_ATTEMPTS: usize = 50;

fn print_schedule(method: &dyn BackoffMethod) {
    let options = method.options();
    println!("Initial delay: {:?}", options.initial_delay());
    println!("attempt 1: immediately");
    for (offset, delay) in method.schedule().take(PRINTED_ATTEMPTS - 1).enumerate() {
        println!("attempt {}: after {delay:?}", offset + 2);
    }
    let max_attempts = options.max_attempts() as usize;
    if max_attempts > PRINTED_ATTEMPTS {
        println!("... {} more attempts", max_attempts - PRINTED_ATTEMPTS);
    }
}

async fn retry_command(
    config: &AppConfig,
    overrides: &BackoffOverrides,
    command: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let Some((program, args)) = command.split_first() else {
        return Err("No command given".into());
    };
    let method = config.backoff_method(overrides);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut attempts = 0;
    let result = attempt_with_backoff_cancellable(method.as_ref(), &cancel, || {
        attempts += 1;
        async move {
            let status = tokio::process::Command::new(program)
                .args(args)
                .status()
                .await
                .map_err(|e| format!("failed to start {program}: {e}"))?;
            if status.success() {
                Ok(())
            } else {
                Err(format!("{program} exited with {status}"))
            }
        }
    })
    .await;

    let operation = command.join(" ");
    match result {
        Ok(()) => {
            if config.enable_audit_log {
                audit::log_retry(&operation, attempts, None).await;
            }
            Ok(())
        }
        Err(e) => {
            if config.enable_audit_log {
                audit::log_retry(&operation, e.attempts(), Some(e.to_string())).await;
            }
            Err(e.into())
        }
    }
}
