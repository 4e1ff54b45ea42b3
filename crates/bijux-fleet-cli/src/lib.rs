// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Operator CLI for the fleet policy pipeline. The `bijux-fleet` binary is a
//! thin wrapper around [`main_entry`].

mod command_output_adapters;
mod commands;
mod fleet_command_actions;

use bijux_fleet_core::{ExitCode, MachineError, ENV_BIJUX_LOG_LEVEL, ENV_FLEET_LOG_JSON};
use bijux_fleet_model::{PromotionAttempt, RejectionKind};
use bijux_fleet_policies::PolicyValidationError;
use bijux_fleet_promotion::{
    config_search_paths, FleetConfig, PromotionError, PromotionErrorCode,
};
use bijux_fleet_store::{StoreError, StoreErrorCode};
use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Generator, Shell};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::AuditCommand;

pub const CRATE_NAME: &str = "bijux-fleet-cli";

const BIJUX_HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
Usage: {usage}

Options:
{options}

Commands:
{subcommands}
{after-help}";

#[derive(Parser)]
#[command(name = "bijux-fleet")]
#[command(version)]
#[command(about = "Ring-based fleet policy validation, drift detection and promotion")]
#[command(help_template = BIJUX_HELP_TEMPLATE)]
#[command(
    after_help = "Environment:\n  BIJUX_FLEET_CONFIG     Config file path\n  BIJUX_FLEET_STATE_DIR  State directory (audit log, last-known-good)\n  BIJUX_FLEET_ACTOR      Actor recorded in audit records\n  BIJUX_FLEET_LOG_JSON   Emit logs as JSON when set to 1\n  BIJUX_LOG_LEVEL        Log verbosity override"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,
    #[arg(long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long, global = true, default_value_t = false)]
    trace: bool,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long = "print-config-paths", default_value_t = false)]
    print_config_paths: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint a policy directory and report every violation.
    Validate { policy_dir: PathBuf },
    /// Diff a policy directory against an observed snapshot.
    DriftCheck {
        #[arg(long)]
        desired: PathBuf,
        #[arg(long)]
        actual: PathBuf,
        #[arg(long)]
        ring: Option<String>,
    },
    /// Gate and apply the policy directory to one ring.
    Promote {
        #[arg(long)]
        ring: String,
        #[arg(long = "change-id")]
        change_id: Option<String>,
        #[arg(long)]
        policies: Option<PathBuf>,
        #[arg(long)]
        actual: Option<PathBuf>,
        #[arg(long, default_value_t = false, requires = "override_reason")]
        emergency_override: bool,
        #[arg(long, requires = "emergency_override")]
        override_reason: Option<String>,
    },
    /// Re-apply a ring's previous last-known-good policy set.
    Rollback {
        #[arg(long)]
        ring: String,
    },
    /// Show the last-known-good table.
    Status,
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Validate a policy directory and print its content hash.
    Hash { policy_dir: PathBuf },
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    Version,
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code as u8)
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => {
                return Err(CliError::usage("invalid command line arguments")
                    .with_detail("error", &err.to_string()));
            }
        },
    };
    let output_mode = OutputMode { json: cli.json };
    let log_flags = LogFlags {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
    };
    init_tracing(log_flags, output_mode);

    if cli.print_config_paths {
        return emit_config_paths(cli.config.as_deref(), output_mode).map_err(CliError::internal);
    }
    let command = cli
        .command
        .ok_or_else(|| CliError::usage("missing command; see --help"))?;
    let config = || FleetConfig::resolve(cli.config.as_deref()).map_err(CliError::from);

    match command {
        Commands::Validate { policy_dir } => {
            fleet_command_actions::validate(&config()?, &policy_dir, output_mode)
        }
        Commands::Hash { policy_dir } => {
            fleet_command_actions::hash(&config()?, &policy_dir, output_mode)
        }
        Commands::DriftCheck {
            desired,
            actual,
            ring,
        } => fleet_command_actions::drift_check(
            &config()?,
            &desired,
            &actual,
            ring.as_deref(),
            output_mode,
        ),
        Commands::Promote {
            ring,
            change_id,
            policies,
            actual,
            emergency_override,
            override_reason,
        } => fleet_command_actions::promote(
            &config()?,
            fleet_command_actions::PromoteArgs {
                ring,
                change_id,
                policies,
                actual,
                override_reason: override_reason.filter(|_| emergency_override),
            },
            output_mode,
        ),
        Commands::Rollback { ring } => {
            fleet_command_actions::rollback(&config()?, &ring, output_mode)
        }
        Commands::Status => fleet_command_actions::status(&config()?, output_mode),
        Commands::Audit { command } => {
            fleet_command_actions::run_audit_command(&config()?, command, output_mode)
        }
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
        Commands::Version => {
            fleet_command_actions::print_version(log_flags.verbose > 0, output_mode)
                .map_err(CliError::internal)
        }
    }
}

#[derive(Clone, Copy)]
struct LogFlags {
    quiet: bool,
    verbose: u8,
    trace: bool,
}

#[derive(Clone, Copy)]
struct OutputMode {
    json: bool,
}

/// Logs go to stderr so stdout stays parseable. Flags win over
/// `BIJUX_LOG_LEVEL`, which wins over `RUST_LOG`.
fn init_tracing(log_flags: LogFlags, output_mode: OutputMode) {
    let flag_level = if log_flags.trace {
        Some("trace")
    } else if log_flags.verbose > 0 {
        Some("debug")
    } else if log_flags.quiet {
        Some("error")
    } else {
        None
    };
    let filter = match flag_level {
        Some(level) => EnvFilter::new(level),
        None => std::env::var(ENV_BIJUX_LOG_LEVEL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(EnvFilter::new)
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
    };
    let log_json = output_mode.json
        || std::env::var(ENV_FLEET_LOG_JSON).is_ok_and(|v| v.trim() == "1");
    let result = if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to install log subscriber: {err}");
    }
}

fn print_completion<G: Generator>(generator: G) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    generate(generator, &mut command, name, &mut std::io::stdout());
}

fn emit_config_paths(
    explicit: Option<&std::path::Path>,
    output_mode: OutputMode,
) -> Result<(), String> {
    let search: Vec<_> = config_search_paths(explicit)
        .into_iter()
        .map(|(scope, path)| json!({"scope": scope, "path": path, "exists": path.is_file()}))
        .collect();
    let state_dir = FleetConfig::resolve(explicit)
        .map(|cfg| cfg.state_dir)
        .map_err(|e| e.to_string())?;
    command_output_adapters::emit_ok(
        output_mode,
        json!({
            "config_search": search,
            "state_dir": state_dir,
        }),
    )
}

#[derive(Debug)]
struct CliError {
    exit_code: ExitCode,
    machine: MachineError,
}

impl CliError {
    fn internal(message: String) -> Self {
        Self {
            exit_code: ExitCode::Internal,
            machine: MachineError::new("internal_error", &message),
        }
    }

    fn dependency(message: String) -> Self {
        Self {
            exit_code: ExitCode::DependencyFailure,
            machine: MachineError::new("dependency_failure", &message),
        }
    }

    fn usage(message: &str) -> Self {
        Self {
            exit_code: ExitCode::Usage,
            machine: MachineError::new("usage_error", message),
        }
    }

    fn validation(code: &str, message: &str) -> Self {
        Self {
            exit_code: ExitCode::Validation,
            machine: MachineError::new(code, message),
        }
    }

    fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.machine = self.machine.with_detail(key, value);
        self
    }

    /// A driven attempt that ended `Rejected`. Collaborator outages are
    /// dependency failures; every other rejection is a validation outcome.
    fn rejected(attempt: &PromotionAttempt) -> Self {
        let Some(rejection) = &attempt.rejection else {
            return Self::internal(format!(
                "attempt {} ended in {} without a rejection",
                attempt.id, attempt.state
            ));
        };
        let exit_code = match rejection.kind {
            RejectionKind::CollectorUnavailable => ExitCode::DependencyFailure,
            _ => ExitCode::Validation,
        };
        Self {
            exit_code,
            machine: MachineError::new(rejection.kind.as_str(), &rejection.to_string())
                .with_detail("attempt_id", attempt.id.as_str())
                .with_detail("ring", attempt.ring.as_str())
                .with_detail("policy_set", &attempt.policy_set_hash.to_string())
                .with_detail("reason", &rejection.reason),
        }
    }
}

impl From<PromotionError> for CliError {
    fn from(err: PromotionError) -> Self {
        let exit_code = match err.code {
            PromotionErrorCode::UnknownRing | PromotionErrorCode::Config => ExitCode::Usage,
            PromotionErrorCode::NoPriorState
            | PromotionErrorCode::ApplyError
            | PromotionErrorCode::AuditChainBroken => ExitCode::Validation,
            PromotionErrorCode::StateLocked => ExitCode::DependencyFailure,
            PromotionErrorCode::Internal => ExitCode::Internal,
        };
        Self {
            exit_code,
            machine: MachineError::new(err.code.as_str(), &err.message),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err.code {
            StoreErrorCode::Conflict | StoreErrorCode::Io => Self::dependency(err.message),
            StoreErrorCode::NotFound | StoreErrorCode::Validation | StoreErrorCode::ChainBroken => {
                Self::validation(err.code.as_str(), &err.message)
            }
            StoreErrorCode::Internal => Self::internal(err.message),
        }
    }
}

impl From<PolicyValidationError> for CliError {
    fn from(err: PolicyValidationError) -> Self {
        let mut out = Self::validation(err.primary_code(), &err.to_string())
            .with_detail("violations", &err.violations.len().to_string());
        for (i, violation) in err.violations.iter().enumerate() {
            out = out.with_detail(&format!("violation.{i:03}"), &violation.to_string());
        }
        out
    }
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        match serde_json::to_string(&error.machine) {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!(
                "{{\"code\":\"internal_error\",\"message\":\"failed to encode structured error\",\"details\":{{}}}}"
            ),
        }
    } else {
        eprintln!("{}", error.machine.message);
    }
}
