use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use timetable_grid::{extract_grid, Fingerprint};
use timetable_sync::logging::{init_tracing, LogFormat};
use timetable_sync::{
    run_interval, run_once, sort_documents, ConfigError, StoreKind, SyncConfig, SyncOrchestrator, DAY_KEY,
};

const EXIT_CONFIG: i32 = 2;

fn cli() -> Command {
    Command::new("timetable-sync")
        .version(timetable_sync::VERSION)
        .about("Sync a timetable spreadsheet into a document store")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("sheet")
                .long("sheet")
                .global(true)
                .help("CSV URL or local path (overrides SHEET_URL)"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .value_parser(value_parser!(StoreKind))
                .help("firestore, file or memory (overrides TIMETABLE_STORE)"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON file for the file store (overrides TIMETABLE_OUTPUT)"),
        )
        .arg(
            Arg::new("collection")
                .long("collection")
                .global(true)
                .help("Collection name (overrides TIMETABLE_COLLECTION)"),
        )
        .subcommand(
            Command::new("run")
                .about("Sync at startup and then on a fixed interval")
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Seconds between cycles (overrides SYNC_INTERVAL_SECS)"),
                ),
        )
        .subcommand(
            Command::new("once").about("Run a single sync cycle").arg(
                Arg::new("strict")
                    .long("strict")
                    .action(ArgAction::SetTrue)
                    .help("Exit 1 if the cycle fails"),
            ),
        )
        .subcommand(Command::new("preview").about("Fetch and extract without writing; print the snapshot"))
        .subcommand(Command::new("show").about("List published documents in natural id order"))
}

fn load_config(args: &ArgMatches) -> Result<SyncConfig, ConfigError> {
    let mut config = SyncConfig::from_env()?;
    if let Some(sheet) = args.get_one::<String>("sheet") {
        config = config.with_sheet(sheet);
    }
    if let Some(store) = args.get_one::<StoreKind>("store") {
        config = config.with_store(*store);
    }
    if let Some(output) = args.get_one::<PathBuf>("output") {
        config = config.with_output(output);
    }
    if let Some(collection) = args.get_one::<String>("collection") {
        config = config.with_collection(collection);
    }
    if let Some(interval) = args.try_get_one::<u64>("interval").ok().flatten() {
        config = config.with_interval_secs(*interval);
    }
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn execute(name: &str, args: &ArgMatches) -> anyhow::Result<i32> {
    let mut config = load_config(args)?;

    match name {
        "run" => {
            let orchestrator = Arc::new(SyncOrchestrator::from_config(&config)?);
            tracing::info!(?orchestrator, "starting");
            let cycles = run_interval(orchestrator, config.interval(), shutdown_signal()).await;
            tracing::info!(cycles, "stopped");
            Ok(0)
        }
        "once" => {
            let orchestrator = SyncOrchestrator::from_config(&config)?;
            let report = run_once(&orchestrator).await;
            Ok(report.exit_code(args.get_flag("strict")))
        }
        "preview" => {
            // Nothing is written, so any store setting will do.
            config = config.with_store(StoreKind::Memory);
            config.validate()?;
            let rows = config
                .build_source()?
                .fetch_rows()
                .await
                .context("fetching sheet")?;
            let extraction = extract_grid(&rows, &config.header_rules());
            let output = serde_json::json!({
                "fingerprint": Fingerprint::of(&extraction.snapshot),
                "headerRow": extraction.header.as_ref().map(|h| h.row_index),
                "stats": extraction.stats,
                "entities": extraction.snapshot,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(0)
        }
        "show" => {
            let store = config.build_store()?;
            let mut documents = store.list_documents().await.context("listing documents")?;
            sort_documents(&mut documents);
            for doc in &documents {
                let slots = doc.day(DAY_KEY).map_or(0, |s| s.len());
                println!("{}\t{} slots", doc.id, slots);
            }
            tracing::info!(documents = documents.len(), store = store.name(), "listed");
            Ok(0)
        }
        other => anyhow::bail!("unknown command {other}"),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let format = if matches.get_flag("log-json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format);

    let Some((name, args)) = matches.subcommand() else {
        std::process::exit(EXIT_CONFIG);
    };

    let code = match execute(name, args).await {
        Ok(code) => code,
        Err(err) => {
            let config_error = err.downcast_ref::<ConfigError>().is_some();
            let message = format!("{err:#}");
            tracing::error!(error = %message, "{name} failed");
            eprintln!("error: {message}");
            if config_error {
                EXIT_CONFIG
            } else {
                1
            }
        }
    };
    std::process::exit(code);
}
