use std::path::PathBuf;

use ccgov_core::LifecycleStage;
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

mod commands;

use commands::Format;

#[derive(Parser)]
#[command(
    name = "ccgov",
    about = "Chaincode deployment governance — approvals, test gates, rollbacks",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to ccgov.toml
    #[arg(short, long, global = true, default_value = "ccgov.toml")]
    config: PathBuf,
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter ccgov.toml
    Init {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        /// Store file recorded in the generated config
        #[arg(long, default_value = "ccgov.redb")]
        store: PathBuf,
    },
    /// Approval policies and test configurations
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Registered chaincode versions
    Versions {
        #[command(subcommand)]
        action: VersionsAction,
    },
    /// Compare two registered versions
    Compare { from: Uuid, to: Uuid },
    /// Approval requests and votes
    Approvals {
        #[command(subcommand)]
        action: ApprovalsAction,
    },
    /// Test suites and the commit gate
    Tests {
        #[command(subcommand)]
        action: TestsAction,
    },
    /// Rollback operations
    Rollback {
        #[command(subcommand)]
        action: RollbackAction,
    },
    /// Deployment log, newest first
    Logs {
        #[arg(long, requires = "channel")]
        name: Option<String>,
        #[arg(long, requires = "name")]
        channel: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Seed policies and test configurations from the config into the store
    Apply,
    /// Show what the store currently enforces
    Show,
}

#[derive(Subcommand)]
enum VersionsAction {
    /// Every version of a chaincode, highest first
    History {
        #[arg(long)]
        name: String,
        #[arg(long)]
        channel: String,
    },
    /// Highest version and the one currently active
    Latest {
        #[arg(long)]
        name: String,
        #[arg(long)]
        channel: String,
    },
    /// Retire a version that is no longer active
    Retire {
        id: Uuid,
        #[arg(long)]
        by: String,
    },
}

#[derive(Subcommand)]
enum ApprovalsAction {
    /// Open an approval request
    Create {
        version_id: Uuid,
        #[arg(long, default_value = "commit")]
        operation: LifecycleStage,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Cast a vote
    Vote {
        request_id: Uuid,
        #[arg(long)]
        by: String,
        #[arg(long, value_enum)]
        decision: Decision,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show a request with its votes
    Show { request_id: Uuid },
    /// List requests
    List {
        #[arg(long)]
        version_id: Option<Uuid>,
        #[arg(long)]
        operation: Option<LifecycleStage>,
        /// Only pending requests
        #[arg(long)]
        pending: bool,
    },
}

#[derive(Subcommand)]
enum TestsAction {
    /// Start a suite for a version
    Run {
        version_id: Uuid,
        #[arg(long = "type", default_value = "unit")]
        test_type: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// Record one case result
    Record {
        suite_id: Uuid,
        #[arg(long)]
        case: String,
        #[arg(long, value_enum)]
        status: CaseOutcome,
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        error: Option<String>,
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Mark a suite skipped
    Skip {
        suite_id: Uuid,
        #[arg(long)]
        reason: String,
    },
    /// Show a suite with its cases
    Show { suite_id: Uuid },
    /// Whether the commit gate holds for a version
    Gate { version_id: Uuid },
}

#[derive(Subcommand)]
enum RollbackAction {
    /// Record a rollback of the active version
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        channel: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        by: String,
        /// Target version (default: the previous committed version)
        #[arg(long)]
        to: Option<Uuid>,
    },
    /// Execute a pending rollback
    Execute {
        operation_id: Uuid,
        #[arg(long)]
        by: String,
    },
    /// Cancel a pending rollback
    Cancel {
        operation_id: Uuid,
        #[arg(long)]
        by: String,
    },
    /// Mark a stalled in-progress rollback failed
    Fail {
        operation_id: Uuid,
        #[arg(long)]
        by: String,
        #[arg(long)]
        reason: String,
    },
    /// Show an operation with its history
    Show { operation_id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Approve,
    Reject,
}

#[derive(Clone, Copy, ValueEnum)]
enum CaseOutcome {
    Passed,
    Failed,
    Skipped,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ccgov=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    if let Commands::Init { path, store } = &cli.command {
        return commands::init::init(path, store);
    }
    let ctx = commands::Context::open(&cli.config)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Policy { action } => match action {
            PolicyAction::Apply => commands::policy::apply(&ctx, format),
            PolicyAction::Show => commands::policy::show(&ctx, format),
        },
        Commands::Versions { action } => match action {
            VersionsAction::History { name, channel } => {
                commands::versions::history(&ctx, &name, &channel, format)
            }
            VersionsAction::Latest { name, channel } => {
                commands::versions::latest(&ctx, &name, &channel, format)
            }
            VersionsAction::Retire { id, by } => commands::versions::retire(&ctx, id, &by, format),
        },
        Commands::Compare { from, to } => commands::versions::compare(&ctx, from, to, format),
        Commands::Approvals { action } => match action {
            ApprovalsAction::Create {
                version_id,
                operation,
                by,
                reason,
            } => commands::approvals::create(
                &ctx,
                version_id,
                operation,
                &by,
                reason.as_deref(),
                format,
            ),
            ApprovalsAction::Vote {
                request_id,
                by,
                decision,
                comment,
            } => commands::approvals::vote(
                &ctx,
                request_id,
                &by,
                decision.into(),
                comment.as_deref(),
                format,
            ),
            ApprovalsAction::Show { request_id } => {
                commands::approvals::show(&ctx, request_id, format)
            }
            ApprovalsAction::List {
                version_id,
                operation,
                pending,
            } => commands::approvals::list(&ctx, version_id, operation, pending, format),
        },
        Commands::Tests { action } => match action {
            TestsAction::Run {
                version_id,
                test_type,
                by,
            } => commands::suites::run(&ctx, version_id, &test_type, by.as_deref(), format),
            TestsAction::Record {
                suite_id,
                case,
                status,
                output,
                error,
                duration_ms,
            } => {
                let report = ccgov_pipeline::CaseReport {
                    name: case,
                    status: status.into(),
                    output,
                    error,
                    duration_ms,
                };
                commands::suites::record(&ctx, suite_id, &report, format)
            }
            TestsAction::Skip { suite_id, reason } => {
                commands::suites::skip(&ctx, suite_id, &reason, format)
            }
            TestsAction::Show { suite_id } => commands::suites::show(&ctx, suite_id, format),
            TestsAction::Gate { version_id } => commands::suites::gate(&ctx, version_id, format),
        },
        Commands::Rollback { action } => match action {
            RollbackAction::Create {
                name,
                channel,
                reason,
                by,
                to,
            } => {
                let request = ccgov_pipeline::RollbackRequest {
                    name,
                    channel,
                    reason,
                    to_version_id: to,
                    requested_by: by,
                };
                commands::rollback::create(&ctx, &request, format)
            }
            RollbackAction::Execute { operation_id, by } => {
                commands::rollback::execute(&ctx, operation_id, &by, format)
            }
            RollbackAction::Cancel { operation_id, by } => {
                commands::rollback::cancel(&ctx, operation_id, &by, format)
            }
            RollbackAction::Fail {
                operation_id,
                by,
                reason,
            } => commands::rollback::fail(&ctx, operation_id, &by, &reason, format),
            RollbackAction::Show { operation_id } => {
                commands::rollback::show(&ctx, operation_id, format)
            }
        },
        Commands::Logs {
            name,
            channel,
            limit,
        } => commands::logs::logs(&ctx, name.as_deref(), channel.as_deref(), limit, format),
    }
}

impl From<Decision> for ccgov_state::VoteDecision {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approve => ccgov_state::VoteDecision::Approve,
            Decision::Reject => ccgov_state::VoteDecision::Reject,
        }
    }
}

impl From<CaseOutcome> for ccgov_state::CaseStatus {
    fn from(o: CaseOutcome) -> Self {
        match o {
            CaseOutcome::Passed => ccgov_state::CaseStatus::Passed,
            CaseOutcome::Failed => ccgov_state::CaseStatus::Failed,
            CaseOutcome::Skipped => ccgov_state::CaseStatus::Skipped,
        }
    }
}
