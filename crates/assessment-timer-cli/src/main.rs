// crates/assessment-timer-cli/src/main.rs
// ============================================================================
// Module: Assessment Timer CLI Entry Point
// Description: Command dispatcher for timer state inspection and conversion.
// Purpose: Provide offline tooling over stored assessment timer states.
// Dependencies: clap, assessment-timer-core, assessment-timer-config,
//               assessment-timer-store-sqlite, serde_json, tracing-subscriber.
// ============================================================================

//! ## Overview
//! The assessment timer CLI validates configuration, inspects timer states
//! held in the `SQLite` store or in standalone files, converts documents
//! between the JSON and packed storage formats, and projects configured
//! scope constraints onto a recorded timeline. All user-facing strings are
//! routed through the message catalog. Inputs are untrusted: file reads are
//! size-bounded and decoding fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use assessment_timer_cli::report;
use assessment_timer_cli::t;
use assessment_timer_config::AssessmentTimerConfig;
use assessment_timer_config::StoreType;
use assessment_timer_core::TargetCriteria;
use assessment_timer_core::TimerFormat;
use assessment_timer_core::TimerState;
use assessment_timer_core::format::decode_state;
use assessment_timer_store_sqlite::MAX_STATE_BYTES;
use assessment_timer_store_sqlite::SqliteTimerStorage;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a timer state document read from disk.
const MAX_INPUT_BYTES: usize = MAX_STATE_BYTES;
/// Log filter used when neither `RUST_LOG` nor a config file sets one.
const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "assessment-timer", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Config file path (defaults to assessment-timer.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Timer state inspection and conversion.
    State {
        /// Selected state subcommand.
        #[command(subcommand)]
        command: StateCommand,
    },
    /// Project configured scope constraints onto a timer state.
    Constraints(ConstraintsCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the config file.
    Validate,
}

/// Timer state subcommands.
#[derive(Subcommand, Debug)]
enum StateCommand {
    /// Summarize a timer state.
    Show(StateShowCommand),
    /// List stored timer states for an owner.
    List(StateListCommand),
    /// Re-encode a timer state in another storage format.
    Convert(StateConvertCommand),
    /// Report server and client durations per tag path.
    Durations(StateDurationsCommand),
}

/// Where a timer state is read from.
#[derive(Args, Debug, Clone, Default)]
struct StateSourceArgs {
    /// Timer state document on disk (JSON or packed).
    #[arg(long, value_name = "PATH", conflicts_with_all = ["owner", "key"])]
    input: Option<PathBuf>,
    /// Owner identifier in the configured store.
    #[arg(long, value_name = "OWNER", requires = "key")]
    owner: Option<String>,
    /// State key in the configured store.
    #[arg(long, value_name = "KEY", requires = "owner")]
    key: Option<String>,
}

impl StateSourceArgs {
    /// Returns true when the state comes from the configured store.
    const fn uses_store(&self) -> bool {
        self.input.is_none()
    }
}

/// Arguments for `state show`.
#[derive(Args, Debug)]
struct StateShowCommand {
    /// State location.
    #[command(flatten)]
    source: StateSourceArgs,
}

/// Arguments for `state list`.
#[derive(Args, Debug)]
struct StateListCommand {
    /// Owner identifier in the configured store.
    #[arg(long, value_name = "OWNER")]
    owner: String,
}

/// Arguments for `state convert`.
#[derive(Args, Debug)]
struct StateConvertCommand {
    /// State location.
    #[command(flatten)]
    source: StateSourceArgs,
    /// Target storage format.
    #[arg(long, value_enum)]
    to: FormatArg,
    /// Output file (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Arguments for `state durations`.
#[derive(Args, Debug)]
struct StateDurationsCommand {
    /// State location.
    #[command(flatten)]
    source: StateSourceArgs,
}

/// Arguments for `constraints`.
#[derive(Args, Debug)]
struct ConstraintsCommand {
    /// State location.
    #[command(flatten)]
    source: StateSourceArgs,
    /// Clock used to measure spent time.
    #[arg(long, value_enum, default_value_t = TargetArg::Server)]
    target: TargetArg,
}

/// Storage formats selectable on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum FormatArg {
    /// Verbose JSON document.
    Json,
    /// Compact packed document.
    Packed,
}

impl FormatArg {
    /// Returns the matching timer format.
    const fn format(self) -> TimerFormat {
        match self {
            Self::Json => TimerFormat::json(),
            Self::Packed => TimerFormat::packed(),
        }
    }
}

/// Clocks selectable on the command line.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum TargetArg {
    /// Server clock.
    Server,
    /// Client clock.
    Client,
}

impl TargetArg {
    /// Returns the matching target criteria.
    const fn criteria(self) -> TargetCriteria {
        match self {
            Self::Server => TargetCriteria::Server,
            Self::Client => TargetCriteria::Client,
        }
    }
}

impl Commands {
    /// Returns true when the command cannot run without a config file.
    const fn needs_config(&self) -> bool {
        match self {
            Self::Config {
                ..
            }
            | Self::Constraints(_) => true,
            Self::State {
                command,
            } => match command {
                StateCommand::Show(StateShowCommand {
                    source,
                })
                | StateCommand::Durations(StateDurationsCommand {
                    source,
                })
                | StateCommand::Convert(StateConvertCommand {
                    source, ..
                }) => source.uses_store(),
                StateCommand::List(_) => true,
            },
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config = if cli.config.is_some() || command.needs_config() {
        Some(load_config(cli.config.as_deref())?)
    } else {
        None
    };
    let level = config.as_ref().map_or(DEFAULT_LOG_LEVEL, |config| config.logging.level.as_str());
    init_tracing(level)?;

    let context = CommandContext {
        config,
    };
    match command {
        Commands::Config {
            command,
        } => command_config(&context, command),
        Commands::State {
            command,
        } => command_state(&context, command),
        Commands::Constraints(command) => command_constraints(&context, &command),
    }
}

/// Shared state resolved before dispatch.
struct CommandContext {
    /// Loaded configuration, present when the command needed one.
    config: Option<AssessmentTimerConfig>,
}

impl CommandContext {
    /// Returns the loaded configuration.
    fn config(&self) -> CliResult<&AssessmentTimerConfig> {
        self.config.as_ref().ok_or_else(|| CliError::new(t!("config.missing")))
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

/// Loads and validates the config file.
fn load_config(path: Option<&Path>) -> CliResult<AssessmentTimerConfig> {
    AssessmentTimerConfig::load(path)
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(level: &str) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| CliError::new(t!("logging.init_failed", error = err)))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| CliError::new(t!("logging.init_failed", error = err)))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(context: &CommandContext, command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => command_config_validate(context),
    }
}

/// Executes the config validation command.
fn command_config_validate(context: &CommandContext) -> CliResult<ExitCode> {
    let config = context.config()?;
    let store = match config.store.store_type {
        StoreType::Memory => "memory",
        StoreType::Sqlite => "sqlite",
    };
    write_stdout_line(&t!(
        "config.validate.ok",
        scopes = config.scopes.len(),
        store = store,
        format = config.timer.format().name()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: State Commands
// ============================================================================

/// Dispatches state subcommands.
fn command_state(context: &CommandContext, command: StateCommand) -> CliResult<ExitCode> {
    match command {
        StateCommand::Show(command) => command_state_show(context, &command),
        StateCommand::List(command) => command_state_list(context, &command),
        StateCommand::Convert(command) => command_state_convert(context, &command),
        StateCommand::Durations(command) => command_state_durations(context, &command),
    }
}

/// Executes `state show`.
fn command_state_show(context: &CommandContext, command: &StateShowCommand) -> CliResult<ExitCode> {
    let state = load_state(context, &command.source)?;
    write_json(&report::summarize(&state))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `state list`.
fn command_state_list(context: &CommandContext, command: &StateListCommand) -> CliResult<ExitCode> {
    let store = open_sqlite_store(context.config()?)?;
    let states = store
        .list_states(&command.owner)
        .map_err(|err| CliError::new(t!("store.load_failed", error = err)))?;
    write_json(&states)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `state convert`.
fn command_state_convert(
    context: &CommandContext,
    command: &StateConvertCommand,
) -> CliResult<ExitCode> {
    let raw = read_state_document(context, &command.source)?;
    let format = command.to.format();
    let encoded = report::convert(&raw, format)
        .map_err(|err| CliError::new(t!("state.encode_failed", error = err)))?;
    match &command.output {
        Some(path) => {
            fs::write(path, encoded.as_bytes()).map_err(|err| {
                CliError::new(t!("output.file_failed", path = path.display(), error = err))
            })?;
            write_stdout_line(&t!(
                "state.convert.ok",
                path = path.display(),
                format = format.name()
            ))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        None => {
            write_stdout_line(&encoded).map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `state durations`.
fn command_state_durations(
    context: &CommandContext,
    command: &StateDurationsCommand,
) -> CliResult<ExitCode> {
    let state = load_state(context, &command.source)?;
    let rows = report::durations(&state)
        .map_err(|err| CliError::new(t!("report.failed", error = err)))?;
    write_json(&rows)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Constraint Commands
// ============================================================================

/// Executes `constraints`.
fn command_constraints(
    context: &CommandContext,
    command: &ConstraintsCommand,
) -> CliResult<ExitCode> {
    let config = context.config()?;
    let state = load_state(context, &command.source)?;
    let constraints = report::constraints(state, config, command.target.criteria())
        .map_err(|err| CliError::new(t!("report.failed", error = err)))?;
    write_json(&constraints)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: State Helpers
// ============================================================================

/// Reads the raw state document from a file or the configured store.
fn read_state_document(context: &CommandContext, source: &StateSourceArgs) -> CliResult<String> {
    if let Some(path) = &source.input {
        return read_text_file(path, &t!("input.kind.state"));
    }
    let (Some(owner), Some(key)) = (&source.owner, &source.key) else {
        return Err(CliError::new(t!("state.source_missing")));
    };
    let store = open_sqlite_store(context.config()?)?;
    let raw = store
        .load_value(owner, key)
        .map_err(|err| CliError::new(t!("store.load_failed", error = err)))?;
    raw.ok_or_else(|| CliError::new(t!("state.not_found", owner = owner, key = key)))
}

/// Reads and decodes a timer state.
fn load_state(context: &CommandContext, source: &StateSourceArgs) -> CliResult<TimerState> {
    let raw = read_state_document(context, source)?;
    let origin = source.input.as_ref().map_or_else(
        || format!("{}/{}", source.owner.as_deref().unwrap_or(""), source.key.as_deref().unwrap_or("")),
        |path| path.display().to_string(),
    );
    let state = decode_state(&raw)
        .map_err(|err| CliError::new(t!("state.decode_failed", path = origin, error = err)))?;
    debug!(origin = %origin, points = state.timeline.len(), "decoded timer state");
    Ok(state)
}

/// Opens the configured `SQLite` store.
fn open_sqlite_store(config: &AssessmentTimerConfig) -> CliResult<SqliteTimerStorage> {
    let Some(store_config) = config.store.sqlite_config() else {
        return Err(CliError::new(t!("store.memory_unsupported")));
    };
    SqliteTimerStorage::new(store_config)
        .map_err(|err| CliError::new(t!("store.open_failed", error = err)))
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads a bounded UTF-8 text file.
fn read_text_file(path: &Path, kind: &str) -> CliResult<String> {
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(t!("input.not_utf8", kind = kind, path = path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
