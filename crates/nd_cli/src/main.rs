use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::info;

use nd_core::{Country, Error, Result, ScrapeEvent, SearchProvider};
use nd_scraper::{GridRequest, ScrapeConfig, ScrapeService};
use nd_search::TavilyProvider;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, default_value = "sqlite", help = "Storage backend. Available backends: sqlite (default), memory")]
    storage: String,
    #[arg(long, help = "Database file for the sqlite backend; falls back to ND_DB_PATH, then nd.db")]
    db_path: Option<PathBuf>,
    #[arg(long, default_value = "gemini", help = "Model to use for inference. Available models: gemini (default), keyword")]
    model: String,
    #[arg(long, help = "Gemini API key; falls back to GEMINI_API_KEY")]
    gemini_api_key: Option<String>,
    #[arg(long, help = "Tavily API key; falls back to TAVILY_API_KEY")]
    tavily_api_key: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    Scrape {
        #[command(subcommand)]
        command: Option<ScrapeCommands>,
    },
    /// Recently scraped articles, newest first
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Store-wide totals as JSON
    Stats,
}

#[derive(clap::Subcommand, Debug)]
enum ScrapeCommands {
    /// One broad pass over today's world news
    Discover,
    /// One query per country and topic combination
    Grid {
        /// Comma-separated country codes (e.g. USA,INDIA,UK)
        #[arg(long, value_delimiter = ',', required = true)]
        countries: Vec<Country>,
        /// Comma-separated topics (e.g. election,trade)
        #[arg(long, value_delimiter = ',', required = true)]
        topics: Vec<String>,
        /// Date folded into the queries, today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

enum RunKind {
    Discover,
    Grid(GridRequest),
}

async fn run_and_stream(service: ScrapeService, run: RunKind) -> Result<()> {
    let mut events = service.subscribe();

    let stopper = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop();
        }
    });

    let runner = service.clone();
    let handle = tokio::spawn(async move {
        match run {
            RunKind::Discover => runner.run_discovery().await,
            RunKind::Grid(request) => runner.run_grid(request).await,
        }
    });

    loop {
        match events.recv().await {
            Ok(ScrapeEvent::Progress {
                stage,
                percent,
                message,
                ..
            }) => {
                println!("[{:>3}%] {} {}", percent, stage, message);
                if stage.is_terminal() {
                    break;
                }
            }
            Ok(ScrapeEvent::Error { message, .. }) => {
                eprintln!("Error: {}", message);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                info!("Event stream lagged, skipped {} events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    let stats = handle.await.map_err(anyhow::Error::new)??;
    println!("Done: {}", stats);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let db_path = cli
        .db_path
        .or_else(|| std::env::var("ND_DB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("nd.db"));
    let store = nd_storage::create_store(&cli.storage, &db_path).await?;
    info!("💾 Storage initialized successfully (using {})", cli.storage);

    match cli.command {
        Commands::Scrape { command } => {
            let tavily_key = cli
                .tavily_api_key
                .or_else(|| std::env::var("TAVILY_API_KEY").ok())
                .ok_or_else(|| Error::Search("TAVILY_API_KEY is not set".to_string()))?;
            let search: Arc<dyn SearchProvider> = Arc::new(TavilyProvider::new(tavily_key)?);

            let gemini_key = cli
                .gemini_api_key
                .or_else(|| std::env::var("GEMINI_API_KEY").ok());
            let model = nd_inference::create_model(&cli.model, gemini_key)?;
            info!("🧠 Inference model initialized successfully (using {})", model.name());

            let service = ScrapeService::new(store, search, model, ScrapeConfig::default());
            let run = match command.unwrap_or(ScrapeCommands::Discover) {
                ScrapeCommands::Discover => RunKind::Discover,
                ScrapeCommands::Grid {
                    countries,
                    topics,
                    date,
                } => RunKind::Grid(GridRequest {
                    countries,
                    topics,
                    date,
                }),
            };
            run_and_stream(service, run).await?;
        }
        Commands::History { limit } => {
            let entries = nd_scraper::service::history(store.as_ref(), limit).await?;
            if entries.is_empty() {
                println!("No articles scraped yet");
            }
            for entry in entries {
                println!(
                    "{}  {}  {}",
                    entry.scraped_at.format("%Y-%m-%d %H:%M"),
                    entry.dna_code,
                    entry.title
                );
            }
        }
        Commands::Stats => {
            let overview = nd_scraper::service::stats_overview(store.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
    }

    Ok(())
}
