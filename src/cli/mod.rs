//! Handlers for the `laneguard` subcommands. Every handler prints one JSON
//! document on stdout and maps policy outcomes onto the exit code.

mod args;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use laneguard_config::{ConfigManager, GovernanceConfig};
use laneguard_core::{
    DelegationMode, ExecutionResult, ExecutionStatus, GovernanceRuntime, Operation, OperationKind,
};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

pub use args::{Cli, Commands, ContentArgs};

/// Exit code for a denied, rejected or failed write. Operational errors
/// exit with 1.
const POLICY_FAILURE: u8 = 2;

/// Resolve configuration from `--config`, `--root` and the environment.
pub fn load_config(cli: &Cli) -> Result<GovernanceConfig> {
    if let Some(root) = &cli.root
        && !root.is_dir()
    {
        bail!("installation root {} does not exist", root.display());
    }

    let manager = match (&cli.config, &cli.root) {
        (Some(path), _) => ConfigManager::load_from_file(path)?,
        (None, Some(root)) => ConfigManager::load_from_root(root)?,
        (None, None) => ConfigManager::load()?,
    };
    let manager = match &cli.root {
        Some(root) => manager.with_root(root),
        None => manager,
    };
    if let Some(path) = manager.config_path() {
        debug!(path = %path.display(), "using configuration file");
    }
    Ok(manager.into_config())
}

pub fn run(cli: Cli, config: GovernanceConfig) -> Result<ExitCode> {
    let mode = match &cli.command {
        Commands::Process { inline: true, .. } => DelegationMode::Inline,
        _ => DelegationMode::Inbox,
    };
    let runtime = GovernanceRuntime::from_config(Arc::new(config), mode)
        .context("Failed to initialise the governance runtime")?;

    match cli.command {
        Commands::Route {
            trigger,
            actor,
            path,
            operation,
            context,
        } => {
            let decision = runtime.route(
                &trigger,
                &actor,
                &path,
                operation.into(),
                &context.to_request_context(),
            )?;
            print_json(&decision)?;
            Ok(outcome(!decision.is_blocked()))
        }
        Commands::Check {
            actor,
            path,
            operation,
            content,
            context,
        } => {
            let content = read_content(&content)?;
            let check = runtime.check_write_allowed(
                &path,
                &actor,
                operation.into(),
                content.as_deref(),
                &context.to_request_context(),
            );
            print_json(&check)?;
            Ok(outcome(check.allowed))
        }
        Commands::Apply {
            actor,
            path,
            operation,
            source,
            risk,
            content,
        } => {
            let operation = build_operation(path, operation.into(), source, &content)?;
            let result = runtime.apply_cli_write(&actor, operation, risk.into());
            report(&result)
        }
        Commands::Process { file, .. } => {
            let file = existing_file(file)?;
            let result = runtime
                .processor()
                .process_file(&file, &runtime.processor_inbox())
                .with_context(|| format!("Failed to archive {}", file.display()))?;
            report(&result)
        }
        Commands::Execute { file } => {
            let file = existing_file(file)?;
            let result = runtime
                .executor()
                .execute_file(&file, &runtime.clc_inbox())
                .with_context(|| format!("Failed to archive {}", file.display()))?;
            report(&result)
        }
        Commands::VerifyAudit => {
            let decisions = runtime.audit().decisions();
            let entries = decisions
                .entries()
                .context("Failed to read the decision log")?;
            let intact = decisions
                .verify_integrity()
                .context("Failed to verify the decision log")?;
            print_json(&json!({
                "log": decisions.path(),
                "entries": entries.len(),
                "intact": intact,
            }))?;
            Ok(outcome(intact))
        }
    }
}

fn build_operation(
    path: String,
    kind: OperationKind,
    source: Option<String>,
    content: &ContentArgs,
) -> Result<Operation> {
    let operation = match kind {
        OperationKind::Add | OperationKind::Modify => {
            let Some(body) = read_content(content)? else {
                bail!("{kind} requires --content or --content-file");
            };
            if kind == OperationKind::Add {
                Operation::add(path, body)
            } else {
                Operation::modify(path, body)
            }
        }
        OperationKind::Delete => Operation::delete(path),
        OperationKind::Move => {
            let Some(source) = source else {
                bail!("move requires --source");
            };
            Operation::move_from(source, path)
        }
    };
    Ok(operation)
}

fn read_content(args: &ContentArgs) -> Result<Option<String>> {
    match (&args.content, &args.content_file) {
        (Some(content), _) => Ok(Some(content.clone())),
        (None, Some(file)) => fs::read_to_string(file)
            .with_context(|| format!("Failed to read content from {}", file.display()))
            .map(Some),
        (None, None) => Ok(None),
    }
}

fn existing_file(file: PathBuf) -> Result<PathBuf> {
    if !file.is_file() {
        bail!("work order file {} does not exist", file.display());
    }
    Ok(file)
}

fn report(result: &ExecutionResult) -> Result<ExitCode> {
    print_json(result)?;
    Ok(outcome(matches!(
        result.status,
        ExecutionStatus::Completed | ExecutionStatus::Executing
    )))
}

fn outcome(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(POLICY_FAILURE)
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}
