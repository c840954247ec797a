use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use backend_guard::config::loader::load_config;
use backend_guard::config::GuardConfig;
use backend_guard::failure_memory::{env_hash, FailureMemory};
use backend_guard::observability::init_logging;
use backend_guard::rate_limit::{QuotaStore, RateLimiter};

#[derive(Parser)]
#[command(name = "guardctl")]
#[command(about = "Inspect quota state and failure memory", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "backend-guard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-backend quota counters
    Quota {
        #[arg(short, long)]
        backend: Option<String>,
    },
    /// Failure memory totals
    Stats,
    /// Most recently updated failure records
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Advisory for running an operation again
    Check(OperationArgs),
    /// Mark an operation's failure record resolved
    Clear(OperationArgs),
    /// Mark an operation's failure record ignored
    Ignore(OperationArgs),
    /// Delete expired failure records now
    Purge,
}

#[derive(Args)]
struct OperationArgs {
    #[arg(short, long)]
    operation: String,

    /// Operation parameters as a JSON document
    #[arg(short, long, default_value = "{}")]
    params: String,

    /// Working directory for the environment fingerprint
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Files included in the environment fingerprint
    #[arg(long)]
    files: Vec<String>,
}

impl OperationArgs {
    fn params(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.params)
    }

    fn env_hash(&self) -> std::io::Result<String> {
        let cwd = match &self.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let files = (!self.files.is_empty()).then_some(self.files.as_slice());
        Ok(env_hash(&cwd, files))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(&cli.config)?;
    init_logging(&config.observability);

    match cli.command {
        Commands::Quota { backend } => {
            let store = Arc::new(QuotaStore::new(&config.rate_limit.state_path));
            let mut statuses = Vec::new();
            for backend_config in config.backends_by_priority() {
                if backend.as_deref().is_some_and(|id| id != backend_config.id) {
                    continue;
                }
                let limiter = RateLimiter::from_config(backend_config, store.clone());
                statuses.push(limiter.status().await);
            }
            if statuses.is_empty() {
                eprintln!("Error: no configured backend matches");
                return Ok(());
            }
            print_json(&statuses)?;
        }
        Commands::Stats => {
            let memory = FailureMemory::open(&config.failure_memory)?;
            print_json(&memory.stats()?)?;
        }
        Commands::Recent { limit } => {
            let memory = FailureMemory::open(&config.failure_memory)?;
            print_json(&memory.recent(limit)?)?;
        }
        Commands::Check(args) => {
            let memory = FailureMemory::open(&config.failure_memory)?;
            let env = args.env_hash()?;
            let advisory = memory.check(&args.operation, &args.params()?, Some(&env));
            print_json(&advisory)?;
        }
        Commands::Clear(args) => {
            let memory = FailureMemory::open(&config.failure_memory)?;
            let changed = memory.clear_failure(&args.operation, &args.params()?, &args.env_hash()?)?;
            report_change(changed, "resolved");
        }
        Commands::Ignore(args) => {
            let memory = FailureMemory::open(&config.failure_memory)?;
            let changed = memory.ignore_failure(&args.operation, &args.params()?, &args.env_hash()?)?;
            report_change(changed, "ignored");
        }
        Commands::Purge => {
            let memory = FailureMemory::open(&config.failure_memory)?;
            println!("{} expired record(s) deleted", memory.purge_expired()?);
        }
    }

    Ok(())
}

/// A missing config file means defaults; a broken one is an error.
fn read_config(path: &Path) -> Result<GuardConfig, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(GuardConfig::default());
    }
    Ok(load_config(path)?)
}

fn report_change(changed: bool, status: &str) {
    if changed {
        println!("record marked {}", status);
    } else {
        eprintln!("Error: no failure record for this operation and environment");
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
