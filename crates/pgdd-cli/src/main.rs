use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pgdd_catalog::DatabaseAdapter;
use pgdd_core::{Config, DatabaseConfig, LogFormat, LogLevel, LoggingConfig};
use pgdd_engine::{dump_file_name, export, Dumper};
use pgdd_storage::{backend_from_config, Storage};
use pgdd_template::{TemplateSyntax, UndefinedPolicy};

/// Config file picked up from the working directory when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "pgdd.toml";

/// pgdd - PostgreSQL data dumps in foreign-key order
#[derive(Parser)]
#[command(name = "pgdd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pgdd.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filtering level (error, warn, info, debug)
    #[arg(long, global = true, env = "PDD_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    /// Log format to use (fmt, json)
    #[arg(long, global = true, env = "PDD_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Verbose output (same as --log-level debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TCP host:port or Unix socket directory
    #[arg(long, global = true, env = "PDD_ADDR")]
    addr: Option<String>,

    /// Database name
    #[arg(long, global = true, env = "PDD_DATABASE")]
    database: Option<String>,

    /// Database user
    #[arg(long, global = true, env = "PDD_USER")]
    user: Option<String>,

    /// Database password
    #[arg(long, global = true, env = "PDD_PASS", hide_env_values = true)]
    pass: Option<String>,

    /// Connect using TLS
    #[arg(long, global = true, env = "PDD_SSL")]
    ssl: bool,

    /// Seconds to wait for a new connection
    #[arg(long, global = true, env = "PDD_DIAL_TIMEOUT", value_name = "SECS")]
    dial_timeout: Option<u64>,

    /// Seconds to wait for catalog queries
    #[arg(long, global = true, env = "PDD_READ_TIMEOUT", value_name = "SECS")]
    read_timeout: Option<u64>,

    /// Connection retries before giving up
    #[arg(long, global = true, env = "PDD_MAX_RETRY")]
    max_retry: Option<u32>,

    /// Path to manifest file
    #[arg(long, global = true, env = "PDD_MANIFEST_FILE")]
    manifest_file: Option<PathBuf>,

    /// Fail on undefined template variables
    #[arg(long, global = true, env = "PDD_STRICT_VARS")]
    strict_vars: bool,

    /// Render extraction queries as Jinja templates
    #[arg(long, global = true, env = "PDD_JINJA")]
    jinja: bool,

    /// Storage backend to use (filesystem)
    #[arg(long, global = true, env = "PDD_BACKEND")]
    backend: Option<String>,

    /// Local filesystem root directory
    #[arg(long, global = true, env = "PDD_FILESYSTEM_ROOT")]
    filesystem_root: Option<PathBuf>,

    /// Seconds allowed for the whole transfer to storage
    #[arg(long, global = true, env = "PDD_STORAGE_TIMEOUT", value_name = "SECS")]
    storage_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump table data to the storage backend (default)
    Dump {
        /// Write a JSON export report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Show the dump order without copying any data
    Plan,
}

impl Cli {
    /// Overlay flags and environment variables on the loaded configuration
    fn apply(&self, config: &mut Config) {
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if self.verbose {
            config.logging.level = LogLevel::Debug;
        }

        let db = &mut config.database;
        if let Some(addr) = &self.addr {
            db.addr = addr.clone();
        }
        if let Some(database) = &self.database {
            db.database = database.clone();
        }
        if let Some(user) = &self.user {
            db.user = user.clone();
        }
        if let Some(pass) = &self.pass {
            db.password = pass.clone();
        }
        if self.ssl {
            db.ssl = true;
        }
        if let Some(secs) = self.dial_timeout {
            db.dial_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout {
            db.read_timeout_secs = secs;
        }
        if let Some(retries) = self.max_retry {
            db.max_retries = retries;
        }

        if let Some(manifest) = &self.manifest_file {
            config.dump.manifest_file = manifest.clone();
        }
        if self.strict_vars {
            config.dump.strict_vars = true;
        }
        if self.jinja {
            config.dump.jinja = true;
        }

        if let Some(backend) = &self.backend {
            config.storage.backend = backend.clone();
        }
        if let Some(root) = &self.filesystem_root {
            config.storage.filesystem.root = root.clone();
        }
        if let Some(secs) = self.storage_timeout {
            config.storage.timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Values from .env are picked up by the PDD_* bindings below
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    init_logging(&config.logging);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting pgdd");
    tracing::debug!(config = ?config, "resolved configuration");

    let db = connect(&config.database).await?;

    let policy = if config.dump.strict_vars {
        UndefinedPolicy::Strict
    } else {
        UndefinedPolicy::Lenient
    };
    let syntax = if config.dump.jinja {
        TemplateSyntax::Jinja
    } else {
        TemplateSyntax::Placeholder
    };
    let dumper = Dumper::from_manifest_file(db, &config.dump.manifest_file, policy)
        .context("failed to create dumper")?
        .with_syntax(syntax);

    match cli.command {
        Some(Commands::Plan) => plan_command(&dumper).await,
        Some(Commands::Dump { report }) => dump_command(&config, &dumper, report.as_deref()).await,
        None => dump_command(&config, &dumper, None).await,
    }
}

/// Config file, then flags and environment on top
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        Config::default()
    };

    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    Ok(config)
}

/// Install the global subscriber; logs go to stderr
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    match config.format {
        LogFormat::Fmt => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[cfg(feature = "postgres")]
async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn DatabaseAdapter>> {
    let adapter = pgdd_catalog::PostgresAdapter::connect(config)
        .await
        .context("failed to create database")?;
    adapter
        .test_connection()
        .await
        .context("failed to ping database")?;
    tracing::debug!(addr = %config.addr, database = %config.database, "database connection verified");
    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "postgres"))]
async fn connect(_config: &DatabaseConfig) -> Result<Arc<dyn DatabaseAdapter>> {
    anyhow::bail!("PostgreSQL support not enabled. Rebuild with --features postgres")
}

/// Dump command - export to the configured backend
async fn dump_command(config: &Config, dumper: &Dumper, report_path: Option<&Path>) -> Result<()> {
    let backend = backend_from_config(&config.storage).context("failed to create backend")?;
    let storage = Storage::new(backend, config.storage.timeout());

    let path = dump_file_name(&chrono::Local::now());
    let report = export(dumper, &storage, &path).await?;

    println!("{} {}", "✓ Dump stored at".green(), report.location);
    println!(
        "  {} tables ({} discovered through foreign keys), {} bytes of data in {} ms",
        report.tables.len(),
        report.implicit_tables(),
        report.bytes_copied,
        report.duration_ms
    );

    if let Some(report_path) = report_path {
        report.save_to_file(report_path)?;
        println!("{} {}", "Report saved to".cyan(), report_path.display());
    }

    Ok(())
}

/// Plan command - print the dump order
async fn plan_command(dumper: &Dumper) -> Result<()> {
    let plan = dumper.plan().await?;

    if plan.is_empty() {
        println!("{}", "Manifest lists no tables".yellow());
        return Ok(());
    }

    println!("{}", "Dump order:".bold());
    for (i, table) in plan.iter().enumerate() {
        let origin = if table.implicit {
            " (dependency)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  {:>3}. {}{}", i + 1, table.table.cyan(), origin);
        println!("       columns: {}", table.columns.join(", "));
        if table.source != table.table {
            println!("       source:  {}", table.source);
        }
        if table.post_actions > 0 {
            println!("       post actions: {}", table.post_actions);
        }
    }

    Ok(())
}
