use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use pat_core::config::{default_policy, Config, Core};

/// Command-line front end for the decision-receipt ledger: submit
/// proposed actions, approve high-stakes ones, inspect and verify the
/// resulting hash-chained log.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the ledger file (defaults to $LOG_PATH or pat_log.jsonl)
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Path to the keyring file (defaults to $KEYRING_PATH or pat_keys.json)
    #[arg(long)]
    keyring_path: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and append a new receipt for a proposed action
    Submit {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        output: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        confidence: Option<f64>,
    },
    /// Sign and append an approval transition for the latest receipt
    /// with the given event id
    Approve {
        #[arg(long = "event-id")]
        event_id: String,
        #[arg(long = "approver-id")]
        approver_id: String,
    },
    /// Show the latest receipt with a given event id
    Show {
        #[arg(long = "event-id")]
        event_id: String,
    },
    /// List every receipt in the ledger
    List,
    /// Walk the hash chain and report any inconsistency
    Verify,
    /// Recompute the policy outcome for a receipt and compare to what
    /// was stored
    Replay {
        #[arg(long = "event-id")]
        event_id: String,
    },
    /// Approver-keyring operations
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Corrupt the last ledger line in place (demo/testing only)
    #[cfg(feature = "tamper-fixture")]
    Tamper {
        #[arg(long = "field-path", default_value = "decision.reason")]
        field_path: String,
    },
    /// Truncate the ledger to empty
    Reset,
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a new approver keypair
    New {
        #[arg(long = "approver-id")]
        approver_id: String,
    },
    /// List approver ids
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(p) = &cli.log_path {
        config.log_path = p.clone();
    }
    if let Some(p) = &cli.keyring_path {
        config.keyring_path = p.clone();
    }

    let core = Core::new(&config, default_policy());

    let outcome = run(&core, cli.command);
    match outcome {
        Ok(value) => {
            print_value(&cli.format, &value);
            Ok(())
        }
        Err(err) => {
            eprintln!("[pat] error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(core: &Core, command: Command) -> Result<serde_json::Value> {
    match command {
        Command::Submit { prompt, output, action, target, params, confidence } => {
            let params = match params {
                Some(text) => serde_json::from_str(&text).context("--params must be valid JSON")?,
                None => serde_json::json!({}),
            };
            let receipt = pat_core::receipt::submit(
                &core.ledger,
                core.clock.as_ref(),
                &core.policy,
                &prompt,
                &output,
                &action,
                &target,
                params,
                confidence,
            )?;
            Ok(serde_json::to_value(receipt)?)
        }
        Command::Approve { event_id, approver_id } => {
            let latest = core
                .ledger
                .find_latest_by_event_id(&event_id)?
                .ok_or_else(|| anyhow!("no receipt found for event id {event_id}"))?;
            let receipt = pat_core::receipt::approve(
                &core.ledger,
                &core.keyring,
                core.clock.as_ref(),
                &core.policy,
                &latest,
                &approver_id,
            )?;
            Ok(serde_json::to_value(receipt)?)
        }
        Command::Show { event_id } => {
            let receipt = core
                .ledger
                .find_latest_by_event_id(&event_id)?
                .ok_or_else(|| anyhow!("no receipt found for event id {event_id}"))?;
            Ok(serde_json::to_value(receipt)?)
        }
        Command::List => {
            let receipts = core.ledger.read_all()?;
            Ok(serde_json::to_value(receipts)?)
        }
        Command::Verify => {
            let (ok, errors) = core.ledger.verify_chain()?;
            if !ok {
                for e in &errors {
                    eprintln!("[pat] {e}");
                }
            }
            Ok(serde_json::json!({"ok": ok, "errors": errors}))
        }
        Command::Replay { event_id } => {
            let receipt = core
                .ledger
                .find_latest_by_event_id(&event_id)?
                .ok_or_else(|| anyhow!("no receipt found for event id {event_id}"))?;
            pat_core::replay::replay_and_compare_json(&receipt, &core.policy).map_err(Into::into)
        }
        Command::Keys { command } => match command {
            KeysCommand::New { approver_id } => {
                core.keyring.new_approver(&approver_id, core.clock.as_ref())?;
                Ok(serde_json::json!({"approver_id": approver_id, "created": true}))
            }
            KeysCommand::List => {
                let approvers = core.keyring.list_approvers()?;
                Ok(serde_json::to_value(approvers)?)
            }
        },
        #[cfg(feature = "tamper-fixture")]
        Command::Tamper { field_path } => {
            let tampered = core.ledger.tamper_last(&field_path)?;
            Ok(serde_json::json!({"tampered": tampered, "field_path": field_path}))
        }
        Command::Reset => {
            core.ledger.reset()?;
            Ok(serde_json::json!({"reset": true}))
        }
    }
}

fn print_value(format: &OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap());
        }
        OutputFormat::Human => print_human(value),
    }
}

fn print_human(value: &serde_json::Value) {
    if let Some(event_id) = value.get("event_id").and_then(|v| v.as_str()) {
        let decision = value
            .pointer("/decision/result")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        let reason = value.pointer("/decision/reason").and_then(|v| v.as_str()).unwrap_or("");
        let label = if decision == "PERMITTED" {
            decision.green().bold()
        } else if decision == "BLOCKED" {
            decision.red().bold()
        } else {
            decision.yellow().bold()
        };
        println!("{} {}  {}", event_id.bright_black(), label, reason);
        return;
    }
    if let Some(ok) = value.get("ok").and_then(|v| v.as_bool()) {
        if ok {
            println!("{} chain verified", "✓".green());
        } else {
            println!("{} chain verification failed", "✗".red());
            if let Some(errors) = value.get("errors").and_then(|v| v.as_array()) {
                for e in errors {
                    println!("  {}", e.as_str().unwrap_or_default().red());
                }
            }
        }
        return;
    }
    if let Some(matched) = value.get("match").and_then(|v| v.as_bool()) {
        let recomputed = value
            .pointer("/recomputed/decision")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        if matched {
            println!("{} replay matches stored decision ({recomputed})", "✓".green());
        } else {
            println!("{} replay diverges from stored decision (now: {recomputed})", "✗".red());
        }
        return;
    }
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}
