use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rentverse_core::{FilterCriteria, FurnishedFilter, PropertyRecord, TypeFilter};
use rentverse_search::{ListingOutcome, ListingView};
use rentverse_storage::{load_listing_file, ListingSource, PropertyClient, SnapshotStore};
use rentverse_web::AppConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rentverse")]
#[command(about = "Rentverse listing search command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Filter and page a property collection.
    Search(SearchArgs),
    /// Fetch listings from the backend and store a snapshot.
    Fetch {
        #[arg(long, default_value = "guest")]
        source: ListingSource,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Serve the listing pages.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Read the collection from a JSON file instead of a snapshot or the API.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    view: Option<String>,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long = "type", default_value = "all")]
    property_type: TypeFilter,
    #[arg(long, default_value_t = 0.0)]
    min_price: f64,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    min_rooms: i64,
    #[arg(long, default_value_t = 0.0)]
    min_size: f64,
    #[arg(long, default_value = "any")]
    furnished: FurnishedFilter,
    #[arg(long, default_value_t = 1)]
    page: usize,
    /// Print the visible page as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Search(args) => search(config, args).await?,
        Commands::Fetch { source, out } => {
            let client = PropertyClient::new(config.client_config())?;
            let records = client
                .fetch_properties(source)
                .await
                .map_err(|err| anyhow::anyhow!(err.user_message()))?;
            let store = SnapshotStore::new(out.unwrap_or(config.snapshot_dir));
            let stored = store
                .store_listing(chrono::Utc::now(), source.id(), &records)
                .await?;
            println!(
                "fetch complete: source={} properties={} snapshot={}{}",
                source.id(),
                stored.record_count,
                stored.path.display(),
                if stored.reused { " (unchanged)" } else { "" }
            );
        }
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.web_port = port;
            }
            rentverse_web::serve(config).await?;
        }
    }

    Ok(())
}

async fn search(mut config: AppConfig, args: SearchArgs) -> Result<()> {
    if let Some(view) = args.view.clone() {
        config.view = view;
    }
    let profile = config.profile()?;
    let mut view = ListingView::new(profile.clone());

    let ticket = view.begin_fetch();
    let loaded = load_records(&config, args.file.as_deref()).await;
    view.complete_fetch(ticket, loaded.map_err(|err| format!("{err:#}")));

    view.set_criteria(FilterCriteria {
        location_text: args.location,
        property_type: args.property_type,
        min_price: args.min_price,
        max_price: profile.normalize_max_price(args.max_price),
        min_rooms: args.min_rooms,
        min_size: args.min_size,
        furnished: args.furnished,
    });
    view.go_to_page(args.page);

    if args.json {
        let visible = view.visible();
        println!("{}", serde_json::to_string_pretty(&visible)?);
        return Ok(());
    }

    match view.outcome() {
        ListingOutcome::NotLoaded | ListingOutcome::Loading => {
            println!("No properties loaded yet");
        }
        ListingOutcome::Failed { message } => {
            println!("Could not load properties: {message}");
        }
        ListingOutcome::NoMatches { total_loaded } => {
            println!("No properties match your filters ({total_loaded} loaded)");
        }
        ListingOutcome::Page(page) => {
            println!(
                "Showing {} properties (page {} of {})",
                page.total_matches, page.page, page.total_pages
            );
            for record in page.items {
                println!("{}", summary_line(record));
            }
        }
    }
    Ok(())
}

/// Explicit file first, then the newest snapshot, then the live backend.
async fn load_records(config: &AppConfig, file: Option<&std::path::Path>) -> Result<Vec<PropertyRecord>> {
    if let Some(path) = file {
        return load_listing_file(path)
            .await
            .map_err(|err| anyhow::anyhow!(err.user_message()))
            .with_context(|| format!("reading {}", path.display()));
    }

    let source = config.listing_source();
    let store = SnapshotStore::new(config.snapshot_dir.clone());
    if let Some(path) = store.latest_snapshot(source.id()).await? {
        info!(path = %path.display(), "using stored snapshot");
        return load_listing_file(&path)
            .await
            .map_err(|err| anyhow::anyhow!(err.user_message()));
    }

    let client = PropertyClient::new(config.client_config())?;
    client
        .fetch_properties(source)
        .await
        .map_err(|err| anyhow::anyhow!(err.user_message()))
}

fn summary_line(record: &PropertyRecord) -> String {
    let location = record
        .address
        .as_ref()
        .map(|a| a.display_line())
        .unwrap_or_default();
    format!(
        "{}  {} [{}] {} rooms, {:.0} m², {} - MYR {:.0}  {}",
        record.id,
        record.name,
        record.property_type,
        record.number_of_rooms,
        record.size,
        if record.furnished { "furnished" } else { "unfurnished" },
        record.price,
        location
    )
}
