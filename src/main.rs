// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::{Path, PathBuf};

use ddlport::app_config::{self, Config, LlmProviderKind};
use ddlport::{Controller, OutputFormat, cancellation};

/// CLI Wrapper for LlmProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Databricks,
}

impl From<CliProvider> for LlmProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::OpenAI => LlmProviderKind::OpenAI,
            CliProvider::Anthropic => LlmProviderKind::Anthropic,
            CliProvider::Databricks => LlmProviderKind::Databricks,
        }
    }
}

/// CLI Wrapper for OutputFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputFormat {
    Sql,
    Json,
    Combined,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(cli_format: CliOutputFormat) -> Self {
        match cli_format {
            CliOutputFormat::Sql => OutputFormat::Sql,
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Combined => OutputFormat::Combined,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate exported DDL artifacts to the target dialect
    #[command(alias = "run")]
    Migrate(MigrateArgs),

    /// Generate shell completions for ddlport
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct MigrateArgs {
    /// Artifact JSON files or directories containing them
    #[arg(value_name = "INPUT", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Records per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Upper bound on batches in flight
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Target SQL dialect
    #[arg(long)]
    target_dialect: Option<String>,

    /// LLM provider for the translator and the judge
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model or serving endpoint name for the translator and the judge
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the translator and the judge
    #[arg(long, env = "DDLPORT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Echo source definitions instead of calling an LLM
    #[arg(long)]
    dry_run: bool,
}

/// ddlport - migrate SQL DDL artifacts between dialects
///
/// Translates exported schema artifacts (tables, views, procedures, grants, ...)
/// with an LLM and validates every statement before writing it out.
#[derive(Parser, Debug)]
#[command(name = "ddlport")]
#[command(version)]
#[command(about = "Batch migration of SQL DDL artifacts between dialects")]
#[command(long_about = "ddlport translates exported schema artifacts from Snowflake to Databricks SQL, \
validates the statements and writes them per artifact type.

EXAMPLES:
    ddlport migrate exports/                         # Migrate every artifact file in a directory
    ddlport migrate tables.json views.json -b 5      # Five records per batch
    ddlport migrate exports/ -f combined -o out/     # SQL scripts and results.json
    ddlport migrate exports/ --dry-run               # Exercise the pipeline offline
    ddlport completions bash > ddlport.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. API keys can also be passed with DDLPORT_API_KEY.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and label for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, label) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, label, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace is the ceiling; the effective level is set once options are known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "ddlport", &mut std::io::stdout());
            Ok(())
        }
        Commands::Migrate(args) => run_migrate(args).await,
    }
}

/// Load the config file, creating it with defaults when missing
fn load_or_create_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

/// Apply command line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, options: &MigrateArgs) {
    if let Some(batch_size) = options.batch_size {
        config.processing.batch_size = batch_size;
    }
    if let Some(max_concurrent) = options.max_concurrent {
        config.processing.max_concurrent_batches = max_concurrent;
    }
    if let Some(output_dir) = &options.output_dir {
        config.output.dir = output_dir.to_string_lossy().to_string();
    }
    if let Some(format) = &options.format {
        config.output.format = format.clone().into();
    }
    if let Some(target_dialect) = &options.target_dialect {
        config.target_dialect = target_dialect.clone();
    }
    for settings in [&mut config.llm.translator, &mut config.llm.judge] {
        if let Some(provider) = &options.provider {
            settings.provider = provider.clone().into();
        }
        if let Some(model) = &options.model {
            settings.model = model.clone();
        }
        if let Some(api_key) = &options.api_key {
            settings.api_key = api_key.clone();
        }
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

async fn run_migrate(options: MigrateArgs) -> Result<()> {
    // Apply the command line log level before anything is logged
    if let Some(cmd_log_level) = &options.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let mut config = load_or_create_config(&options.config_path)?;
    apply_overrides(&mut config, &options);
    log::set_max_level(level_filter(&config.log_level));

    let output_dir = PathBuf::from(&config.output.dir);
    let controller = Controller::with_config(config)?.dry_run(options.dry_run);

    let (handle, token) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight batches");
            handle.cancel();
        }
    });

    let report = controller.run(&options.inputs, &output_dir, &token).await?;

    info!(
        "Done: {} file(s) written to {:?}{}",
        report.written.len(),
        output_dir,
        if report.skipped_inputs > 0 {
            format!(" ({} input(s) skipped)", report.skipped_inputs)
        } else {
            String::new()
        }
    );

    Ok(())
}
