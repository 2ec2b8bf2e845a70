use anyhow::Context;
use clap::Parser;
use hubstress_config::domains::logging::LogLevel;
use hubstress_config::{ConfigLoader, HubstressConfig};
use hubstress_core::{purge, run_activity, run_stress_test};
use hubstress_http::{HubApi, HubClient};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::{Cli, Commands};

// Exit codes: 0 success, 1 validation error, 128 any run-time failure.
const EXIT_VALIDATION: i32 = 1;
const EXIT_RUNTIME: i32 = 128;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let loader = ConfigLoader::new();
    let mut config = match loader.load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            return EXIT_VALIDATION;
        }
    };
    apply_cli_overrides(&cli, &mut config);

    let log_file = resolve_log_file(&cli, &config);
    let _guard = match init_logging(config.logging.level, log_file.clone()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Failed to initialize logging: {:#}", err);
            return EXIT_VALIDATION;
        }
    };

    if let Err(err) = config
        .validate_all()
        .and_then(|_| config.hub.validate_for_run())
    {
        error!("{}", err);
        return EXIT_VALIDATION;
    }

    if log_file.is_some() {
        // Log the effective parameters for posterity. HubConfig's Debug
        // impl redacts the token.
        info!(
            hub = ?config.hub,
            stress = ?config.stress,
            dry_run = cli.dry_run,
            "Run parameters"
        );
    }

    let client = match HubClient::new(&config.hub, &config.http, cli.dry_run) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to build hub client: {}", err);
            return EXIT_VALIDATION;
        }
    };
    let client: Arc<dyn HubApi> = Arc::new(client);

    let prefix = config.hub.username_prefix.clone();
    let result = match cli.command {
        Commands::Run { keep, .. } => run_stress_test(client, &config.stress, &prefix, keep).await,
        Commands::Activity { keep, .. } => {
            run_activity(client, &config.stress, &prefix, keep, cli.dry_run)
                .await
                .map(|_| ())
        }
        Commands::Purge => purge(client, &config.stress, &prefix).await,
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            error!("{}", err);
            EXIT_RUNTIME
        }
    }
}

/// Fold CLI flags over the loaded configuration; flags win
fn apply_cli_overrides(cli: &Cli, config: &mut HubstressConfig) {
    if let Some(endpoint) = &cli.endpoint {
        config.hub.endpoint = endpoint.clone();
    }
    if let Some(token) = &cli.token {
        config.hub.token = token.clone();
    }
    if let Some(level) = &cli.log_level {
        if let Ok(level) = LogLevel::from_str(level) {
            config.logging.level = level;
        } else {
            eprintln!("Ignoring invalid log level: {}", level);
        }
    }
    if cli.verbose {
        config.logging.level = LogLevel::Debug;
    }

    match &cli.command {
        Commands::Run { count, batch_size, .. } => {
            if let Some(count) = count {
                config.stress.count = *count;
            }
            if let Some(batch_size) = batch_size {
                config.stress.batch_size = *batch_size;
            }
        }
        Commands::Activity { count, workers, .. } => {
            if let Some(count) = count {
                config.stress.count = *count;
            }
            if let Some(workers) = workers {
                config.stress.workers = *workers;
            }
        }
        Commands::Purge => {}
    }
}

/// Decide where logs go: an explicit file, a generated file under /tmp when
/// --log-to-file is given bare, the configured file, or stdout
fn resolve_log_file(cli: &Cli, config: &HubstressConfig) -> Option<PathBuf> {
    match &cli.log_to_file {
        Some(Some(path)) => Some(path.clone()),
        Some(None) => {
            let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S");
            Some(PathBuf::from(format!("/tmp/hub-stress-test-{}.log", timestamp)))
        }
        None => config.logging.file.clone(),
    }
}

/// Initialize the tracing subscriber once, before any work happens
///
/// The returned guard must stay alive for the process lifetime so the
/// non-blocking file writer flushes on exit.
fn init_logging(level: LogLevel, file: Option<PathBuf>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));

    match file {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            println!("Redirecting logs to: {}", path.display());
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}
