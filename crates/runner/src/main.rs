use std::sync::Arc;

use herald_clock::SystemClock;
use herald_gateway::LogProvider;
use herald_runner::{AlertEngine, EngineConfig, Fixture, MemoryBackend, Trigger};
use tokio::sync::watch;

fn print_help() {
    eprintln!(
        r#"Herald - trade alert notification engine

USAGE:
    herald [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --fixture <PATH>    Seed rules, preferences and trades from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    HERALD_CONFIG       Configuration file, if --config is not given
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Run with defaults and no data
    herald

    # Run against a seed fixture
    herald --config demos/herald.json --fixture demos/fixture.json
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = std::env::var("HERALD_CONFIG").ok();
    let mut fixture_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--fixture" | "-f" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --fixture requires a path argument");
                    std::process::exit(1);
                }
                fixture_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            log::info!("Loading configuration from: {}", path);
            EngineConfig::from_file(&path)?
        }
        None => {
            log::info!("Using default configuration");
            EngineConfig::default()
        }
    };

    let backend = MemoryBackend::new();
    if let Some(path) = fixture_path {
        log::info!("Loading fixture from: {}", path);
        Fixture::from_file(&path)?.load_into(&backend)?;
    }

    let ports = backend.ports(Arc::new(LogProvider::new()), Arc::new(SystemClock));
    let engine = Arc::new(AlertEngine::new(config, ports)?);

    log::info!(
        "Starting Herald: {} workers, match pass every {:?}, {} sends/s",
        config.pool.workers,
        config.matcher.interval(),
        config.rate_limit.per_second
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = engine.spawn_workers();
    let trigger = tokio::spawn(Trigger::new(engine.clone()).run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    log::info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    pool.shutdown().await?;
    trigger.await?;

    log::info!("Herald stopped, {} history entries recorded", backend.history.len());
    Ok(())
}
