use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use snapshot_tool::config::{self, Config};
use snapshot_tool::engine::SnapshotEngine;
use snapshot_tool::event::{Event, EventHandler};
use snapshot_tool::logging;
use snapshot_tool::report;
use snapshot_tool::scheduler::{SnapshotInterval, StartOutcome};
use snapshot_tool::system::process::{ProcessCategory, filter_names, unique_names};

#[derive(Parser)]
#[command(
    name = "snapshot-tool",
    about = "Capture and restore snapshots of running processes, memory and connections"
)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding snapshot files
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture the current system state
    Create,
    /// List stored snapshots
    List,
    /// Summarize a stored snapshot
    Show { name: String },
    /// Relaunch processes recorded in a snapshot
    Restore(RestoreArgs),
    /// Delete one snapshot, or all of them
    Delete(DeleteArgs),
    /// Take snapshots periodically until Ctrl-C
    Watch {
        /// 1s, 1m, 5m, 15m, 30m, 1h, 3h, 6h, 12h or 24h (seconds or labels also work)
        #[arg(long)]
        interval: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    User,
    System,
}

impl From<CategoryArg> for ProcessCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::User => ProcessCategory::User,
            CategoryArg::System => ProcessCategory::System,
        }
    }
}

#[derive(Args)]
struct RestoreArgs {
    name: String,

    /// Which group of applications to pick from
    #[arg(long, value_enum, default_value = "user")]
    category: CategoryArg,

    /// Only list names containing this text (case-insensitive)
    #[arg(long)]
    filter: Option<String>,

    /// Application name to relaunch; repeat for several
    #[arg(long = "app")]
    apps: Vec<String>,
}

#[derive(Args)]
struct DeleteArgs {
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    name: Option<String>,

    /// Delete every snapshot
    #[arg(long)]
    all: bool,

    /// Confirm deleting every snapshot
    #[arg(long)]
    yes: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init_tracing(&config.logging.level, config.logging.json)?;

    let mut engine = SnapshotEngine::new(&config)?;

    match cli.command {
        Command::Create => {
            let path = engine.create_snapshot()?;
            println!("Snapshot created: {}", path.display());
        }
        Command::List => {
            let names = engine.list_snapshots()?;
            println!("{}", report::snapshot_list(&names));
        }
        Command::Show { name } => {
            let snapshot = engine.load_snapshot_for_restore(&name)?;
            let classification = engine.classify(&snapshot);
            println!("{}", report::snapshot_summary(&name, &snapshot, &classification));
        }
        Command::Restore(args) => restore(&engine, args)?,
        Command::Delete(args) => delete(&engine, args)?,
        Command::Watch { interval } => {
            let interval = match interval {
                Some(text) => text.parse::<SnapshotInterval>()?,
                None => SnapshotInterval::from_secs(config.scheduler.default_interval_secs)?,
            };
            watch(&mut engine, interval).await?;
        }
    }

    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    };

    if let Some(dir) = &cli.snapshot_dir {
        config.storage.directory = Some(dir.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_json {
        config.logging.json = true;
    }

    config
}

fn restore(engine: &SnapshotEngine, args: RestoreArgs) -> Result<()> {
    let snapshot = engine.load_snapshot_for_restore(&args.name)?;
    let classification = engine.classify(&snapshot);
    let category = ProcessCategory::from(args.category);

    if args.apps.is_empty() {
        let names = classification.names(category);
        let matching = filter_names(names, args.filter.as_deref().unwrap_or(""));
        let choices = unique_names(matching);
        if choices.is_empty() {
            println!("No {} match.", category.label().to_lowercase());
        } else {
            println!("{} in {}:", category.label(), args.name);
            for name in choices {
                println!("  {}", report::display_name(name));
            }
            println!("Pass --app <NAME> to relaunch.");
        }
        return Ok(());
    }

    println!(
        "Selected {} to restore: {}",
        category.label().to_lowercase(),
        args.apps.join(", ")
    );
    let reports = engine.restore_selected(&snapshot, args.apps.as_slice());
    if reports.is_empty() {
        println!("  No processes in {} matched the selection.", args.name);
    }
    for line in report::restore_lines(&reports) {
        println!("{line}");
    }
    Ok(())
}

fn delete(engine: &SnapshotEngine, args: DeleteArgs) -> Result<()> {
    if args.all {
        if !args.yes {
            return Err(eyre!("refusing to delete all snapshots without --yes"));
        }
        let reports = engine.delete_all_snapshots()?;
        for line in report::delete_lines(&reports) {
            println!("{line}");
        }
        return Ok(());
    }

    let name = args
        .name
        .ok_or_else(|| eyre!("a snapshot name or --all is required"))?;
    engine.delete_snapshot(&name)?;
    println!("Snapshot '{name}' deleted successfully.");
    Ok(())
}

async fn watch(engine: &mut SnapshotEngine, interval: SnapshotInterval) -> Result<()> {
    if let StartOutcome::Started(interval) = engine.start_scheduler(interval.as_secs())? {
        println!("Automatic snapshots will be taken every {interval}. Press Ctrl-C to stop.");
    }
    let mut events = EventHandler::new(interval.as_duration());

    while let Some(event) = events.next().await {
        match event {
            Event::Tick => match engine.on_tick() {
                Some(Ok(path)) => println!("Snapshot created: {}", path.display()),
                // Already logged by the engine; keep the schedule going.
                Some(Err(e)) => eprintln!("Error creating snapshot: {e}"),
                None => break,
            },
            Event::Shutdown => break,
        }
    }

    engine.stop_scheduler();
    println!("Automatic snapshots stopped.");
    Ok(())
}
