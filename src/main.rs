use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use geoatlas::{
    Config, ConnectionMonitor, CoordinateResolver, GeoCatalog, HttpEventSource,
    LocationSearchIndex, NavigationStateMachine, StatsRefresher, Transition,
};

#[derive(Parser)]
#[command(name = "geoatlas", about = "Browse and search the geographic story directory")]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print catalog counts
    Summary,
    /// Search every level by name
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Map a coordinate to a country
    Resolve {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Drill down by ids from the world view and list what is visible
    Browse {
        ids: Vec<String>,
        /// Seed the position from a coordinate before drilling
        #[arg(long, allow_negative_numbers = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lng: Option<f64>,
    },
    /// Watch story statistics for a drill position
    Stats {
        ids: Vec<String>,
        /// Print the first snapshot and exit
        #[arg(long)]
        once: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geoatlas=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref()).context("loading config")?;
    let catalog = Arc::new(match &config.catalog_path {
        Some(path) => GeoCatalog::load(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => GeoCatalog::bundled().context("loading bundled catalog")?,
    });

    match cli.command {
        Command::Summary => {
            println!("{}", serde_json::to_string_pretty(&catalog.summary())?);
        }
        Command::Search { query, limit } => {
            let index = LocationSearchIndex::new(&catalog);
            let results = index.search_with_limit(&query, limit.unwrap_or(config.search_limit));
            if results.is_empty() {
                println!("No matches for {query:?}");
            }
            for result in results {
                println!("{:<9} {}", result.kind.as_str(), result.path.join(" > "));
            }
        }
        Command::Resolve { lat, lng } => match CoordinateResolver::new(&catalog).resolve(lat, lng) {
            Some(location) => println!("{}", serde_json::to_string_pretty(&location)?),
            None => println!("No country found near ({lat}, {lng})"),
        },
        Command::Browse { ids, lat, lng } => {
            let mut nav = NavigationStateMachine::new(catalog.clone());
            if let (Some(lat), Some(lng)) = (lat, lng) {
                if let Some(location) = CoordinateResolver::new(&catalog).resolve(lat, lng) {
                    nav.auto_detect_location(&location);
                }
            }
            if let Some(target) = drill(&mut nav, &ids) {
                println!("Open locality: {}", target.path.join(" > "));
                return Ok(());
            }
            let trail: Vec<String> = nav.breadcrumbs().into_iter().map(|b| b.name).collect();
            println!("World{}", trail.iter().map(|n| format!(" > {n}")).collect::<String>());
            for item in nav.current_items() {
                println!("  {:<24} {}", item.id, item.name);
            }
        }
        Command::Stats { ids, once } => {
            let mut nav = NavigationStateMachine::new(catalog.clone());
            drill(&mut nav, &ids);
            let target = nav
                .stats_target()
                .context("no statistics below country level")?;

            let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
            runtime.block_on(watch_stats(catalog, &config, target, once))?;
        }
    }

    Ok(())
}

fn drill(
    nav: &mut NavigationStateMachine,
    ids: &[String],
) -> Option<geoatlas::navigation::LocalityTarget> {
    for id in ids {
        match nav.drill_down_id(id) {
            Transition::Moved(_) => {}
            Transition::Exit(target) => return Some(target),
            Transition::Rejected => {
                tracing::warn!(id = %id, level = %nav.level(), "Not found here, stopping");
                break;
            }
        }
    }
    None
}

async fn watch_stats(
    catalog: Arc<GeoCatalog>,
    config: &Config,
    target: geoatlas::StatsTarget,
    once: bool,
) -> anyhow::Result<()> {
    let source = Arc::new(HttpEventSource::new(config.event_source_url.clone()));
    let handle = StatsRefresher::spawn(catalog, source, config.stats_settings(), Some(target));
    let mut status_rx = handle.subscribe();
    let errors = handle.errors();
    let monitor = ConnectionMonitor::new();

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                changed.context("stats refresher stopped")?;
                let status = status_rx.borrow_and_update().clone();
                monitor.set_connected(status.last_error.is_none());
                println!("{}", serde_json::to_string_pretty(&status)?);
                if once {
                    break;
                }
            }
            Ok(error) = errors.recv_async() => {
                eprintln!("Could not refresh statistics: {error}");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}
