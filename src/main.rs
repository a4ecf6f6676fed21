use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pansou_client::cloud_types;
use pansou_client::config::{self, AppConfig};
use pansou_client::health::{self, ApiStatus};
use pansou_client::models::{CategorizedResultSet, ResourceLink, SearchQuery};
use pansou_client::orchestrator::{OrchestratorOptions, SearchEvent, SearchOrchestrator, SessionOutcome};
use pansou_client::settings::{DensityMode, SettingsStore};
use pansou_client::transport::{HttpTransport, SearchTransport};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIME"), ")");

#[derive(Parser)]
#[command(name = "pansou", version, long_version = LONG_VERSION)]
#[command(about = "Netdisk resource search with progressive backfill")]
struct Cli {
    /// API domain or base URL, overrides config.json
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search and keep backfilling results
    Search {
        /// Search keyword
        #[arg(required = true)]
        keyword: Vec<String>,
        /// Restrict to these cloud types (comma separated); defaults to saved settings
        #[arg(short = 't', long = "cloud-types", value_delimiter = ',')]
        cloud_types: Vec<String>,
        /// Save the given cloud types as the default filter
        #[arg(long)]
        remember: bool,
        /// Total rounds including the first
        #[arg(long)]
        rounds: Option<u32>,
        /// Delay between rounds in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Print the final result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether the search API is reachable
    Health {
        /// Keep polling on the configured interval
        #[arg(long)]
        watch: bool,
    },
    /// List known cloud types
    Types,
    /// Show or change saved settings
    Settings {
        #[arg(long = "cloud-types", value_delimiter = ',')]
        cloud_types: Option<Vec<String>>,
        /// comfortable or compact
        #[arg(long)]
        density: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pansou_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut app_config = config::load_config().context("Failed to load configuration")?;
    app_config.apply_env();
    if let Some(api) = cli.api {
        app_config.api.domain = api;
    }
    let store = SettingsStore::new(app_config.settings_path());

    match cli.command {
        Command::Search {
            keyword,
            cloud_types,
            remember,
            rounds,
            delay_ms,
            json,
        } => {
            if let Some(rounds) = rounds {
                app_config.search.rounds = rounds.max(1);
            }
            if let Some(delay_ms) = delay_ms {
                app_config.search.round_delay_ms = delay_ms;
            }
            run_search(&app_config, &store, keyword.join(" "), cloud_types, remember, json).await
        }
        Command::Health { watch } => run_health(&app_config, watch).await,
        Command::Types => {
            for t in cloud_types::all() {
                let suffix = if t.is_copy_only() { "  (copy only)" } else { "" };
                println!("{:<10} {}{}", t.key, t.label, suffix);
            }
            Ok(())
        }
        Command::Settings { cloud_types, density } => {
            let mut settings = store.load();
            if let Some(cloud_types) = cloud_types {
                settings = store.set_cloud_types(cloud_types)?;
            }
            if let Some(density) = density {
                settings = store.set_density(DensityMode::from(density.as_str()))?;
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

async fn run_search(
    app_config: &AppConfig,
    store: &SettingsStore,
    keyword: String,
    cloud_types: Vec<String>,
    remember: bool,
    json: bool,
) -> anyhow::Result<()> {
    let settings = store.load();
    let cloud_types = if cloud_types.is_empty() {
        settings.selected_cloud_types.clone()
    } else {
        if remember {
            store
                .set_cloud_types(cloud_types.clone())
                .context("Failed to save settings")?;
        }
        cloud_types
    };

    let query = SearchQuery::new(&keyword)?.with_cloud_types(cloud_types);
    let transport = Arc::new(HttpTransport::from_config(app_config)?);
    tracing::info!("Using search API {}", transport.base_url());

    let orchestrator =
        SearchOrchestrator::new(transport, OrchestratorOptions::from_config(app_config));
    let density = settings.density;

    let outcome = orchestrator
        .run_session(query, |event| {
            if json {
                return;
            }
            match event {
                SearchEvent::FirstResult { result, .. } => {
                    if result.total() == 0 {
                        println!("No resources found for \"{}\"", keyword);
                    } else {
                        println!("Found {} resources, searching for more...", result.total());
                    }
                }
                SearchEvent::Update { round, added, merged, .. } => {
                    println!("Round {}: +{} new, {} total", round, added, merged.total());
                }
                _ => {}
            }
        })
        .await;

    match outcome {
        SessionOutcome::Settled(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.total() > 0 {
                print_results(&result, density);
            }
            Ok(())
        }
        SessionOutcome::Failed(message) => anyhow::bail!("Search failed: {}", message),
        SessionOutcome::Cancelled => anyhow::bail!("Search was cancelled"),
    }
}

fn print_results(result: &CategorizedResultSet, density: DensityMode) {
    println!();
    println!("{} resources in total", result.total());
    for (category, links) in result.ordered_categories() {
        if links.is_empty() {
            continue;
        }
        println!();
        println!("== {} ({}) ==", cloud_types::label(category), links.len());
        for link in links {
            print_link(link, density);
        }
    }
}

fn print_link(link: &ResourceLink, density: DensityMode) {
    let note = if link.note.is_empty() { "Untitled resource" } else { link.note.as_str() };
    match density {
        DensityMode::Compact => {
            let code = link
                .password
                .as_deref()
                .map(|p| format!(" [{}]", p))
                .unwrap_or_default();
            println!("  {}{}  {}", link.url, code, note);
        }
        DensityMode::Comfortable => {
            println!("  {}", note);
            println!("    {}", link.url);
            if let Some(password) = &link.password {
                println!("    code: {}", password);
            }
            let when = link
                .datetime
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            println!("    {}", when);
        }
    }
}

async fn run_health(app_config: &AppConfig, watch: bool) -> anyhow::Result<()> {
    let transport: Arc<dyn SearchTransport> = Arc::new(HttpTransport::from_config(app_config)?);

    if !watch {
        let status = health::probe(transport.as_ref()).await;
        println!("{}", status.as_str());
        if status != ApiStatus::Online {
            anyhow::bail!("Search API is offline");
        }
        return Ok(());
    }

    let monitor = health::HealthMonitor::spawn(transport, app_config.health_interval());
    let mut status = monitor.subscribe();
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                println!("{}", current.as_str());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    monitor.stop();
    Ok(())
}
