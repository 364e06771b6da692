//! Command-line surface of the `laneguard` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use laneguard_core::{OperationKind, RequestContext, RiskLevel, RollbackStrategy};

#[derive(Debug, Parser)]
#[command(name = "laneguard")]
#[command(about = "Route, admit and apply governed filesystem writes")]
#[command(version)]
pub struct Cli {
    /// Configuration file (otherwise LANEGUARD_CONFIG_PATH, then <root>/laneguard.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Installation root; overrides the configured one
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print the routing decision for one write
    Route {
        /// Trigger token, e.g. `cli` or `background`
        trigger: String,
        actor: String,
        path: String,

        #[arg(long, value_enum, default_value_t = OperationArg::Modify)]
        operation: OperationArg,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Run the sandbox admission check for one write
    Check {
        actor: String,
        path: String,

        #[arg(long, value_enum, default_value_t = OperationArg::Modify)]
        operation: OperationArg,

        #[command(flatten)]
        content: ContentArgs,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Apply one interactive write through lane routing
    Apply {
        actor: String,
        path: String,

        #[arg(long, value_enum, default_value_t = OperationArg::Modify)]
        operation: OperationArg,

        /// Source path for a move
        #[arg(long, required_if_eq("operation", "move"))]
        source: Option<String>,

        #[arg(long, value_enum, default_value_t = RiskArg::Low)]
        risk: RiskArg,

        #[command(flatten)]
        content: ContentArgs,
    },

    /// Process a work order file through the lane processor
    Process {
        file: PathBuf,

        /// Run STRICT-lane work immediately instead of queueing it for the executor
        #[arg(long)]
        inline: bool,
    },

    /// Execute a BACKGROUND work order file as the background executor
    Execute { file: PathBuf },

    /// Check the decision log hash chain
    VerifyAudit,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ContentArgs {
    /// New file content
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the new file content from this file
    #[arg(long, value_name = "FILE")]
    pub content_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ContextArgs {
    #[arg(long, value_enum)]
    pub risk: Option<RiskArg>,

    #[arg(long, value_enum)]
    pub rollback: Option<RollbackArg>,

    /// An equivalent change was approved before
    #[arg(long)]
    pub similar_approved: bool,

    /// The write already passed auto-approval
    #[arg(long)]
    pub auto_approved: bool,

    #[arg(long)]
    pub wo_id: Option<String>,
}

impl ContextArgs {
    pub fn to_request_context(&self) -> RequestContext {
        let mut context = RequestContext::new()
            .with_rollback_opt(self.rollback.map(RollbackStrategy::from))
            .similar_change_approved(self.similar_approved)
            .auto_approved(self.auto_approved);
        if let Some(risk) = self.risk {
            context = context.with_risk(risk.into());
        }
        if let Some(wo_id) = &self.wo_id {
            context = context.with_wo_id(wo_id);
        }
        context
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Add,
    Modify,
    Delete,
    Move,
}

impl From<OperationArg> for OperationKind {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Add => OperationKind::Add,
            OperationArg::Modify => OperationKind::Modify,
            OperationArg::Delete => OperationKind::Delete,
            OperationArg::Move => OperationKind::Move,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RiskArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<RiskArg> for RiskLevel {
    fn from(value: RiskArg) -> Self {
        match value {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
            RiskArg::Critical => RiskLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RollbackArg {
    #[value(alias = "git")]
    GitRevert,
    #[value(alias = "backup", alias = "snapshot")]
    BackupRestore,
}

impl From<RollbackArg> for RollbackStrategy {
    fn from(value: RollbackArg) -> Self {
        match value {
            RollbackArg::GitRevert => RollbackStrategy::GitRevert,
            RollbackArg::BackupRestore => RollbackStrategy::BackupRestore,
        }
    }
}
