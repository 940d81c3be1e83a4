mod config;
mod error;
mod fetcher;
mod http_client;
mod models;
mod opener;
mod query;
mod scrapers;
mod search;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use fetcher::HttpFetcher;
use models::Listing;
use scrapers::AmazonExtractor;
use search::{SearchState, Searcher};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "usedfinder")]
#[command(about = "Search Amazon used listings from the terminal", long_about = None)]
struct Args {
    /// Search term. Without one, queries are read interactively from stdin
    query: Vec<String>,

    /// Print listings as JSON
    #[arg(long)]
    json: bool,

    /// Open the N-th listing (1-based) in the browser after searching
    #[arg(long, value_name = "N")]
    open: Option<usize>,

    /// Extract listings from a saved results page instead of fetching
    #[arg(long, value_name = "PATH")]
    html_file: Option<String>,

    /// Test URL fetching - fetch and print HTML from a URL
    #[arg(long)]
    test_url: Option<String>,

    /// Save HTML to file when using --test-url
    #[arg(long)]
    save_html: Option<String>,

    /// Write the default data/config.yaml and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        Config::create_default()?;
        println!("Wrote default configuration to {}", config::CONFIG_PATH);
        return Ok(());
    }

    // Load config first (before logging is initialized)
    let config = Config::load()?;
    init_logging(&config);

    if let Some(url) = args.test_url.as_deref() {
        return test_url_fetch(url, args.save_html.as_deref(), &config).await;
    }

    if let Some(path) = args.html_file.as_deref() {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path))?;
        let listings = AmazonExtractor::extract(&html);
        return print_listings(&listings, args.json);
    }

    let fetcher = HttpFetcher::new(&config.user_agent, config.request_timeout())?;
    let searcher = Searcher::new(Arc::new(fetcher));

    if args.query.is_empty() {
        return interactive(&searcher, args.json).await;
    }

    let state = searcher.search(&args.query.join(" ")).await;
    print_state(&state, args.json)?;

    if let Some(position) = args.open {
        open_listing(&state.listings, position)?;
    }

    Ok(())
}

/// Initialize logging - use RUST_LOG env var if set, otherwise use config
fn init_logging(config: &Config) {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("Logging level set from RUST_LOG environment variable");
        return;
    }

    let level = config.tracing_level.to_lowercase();
    let max_level = match level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Invalid tracing level '{}', using 'info'", level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Logging level set to: {}", level);
}

/// Reads queries line by line; `open <n>` opens a listing from the last search
async fn interactive(searcher: &Searcher, json: bool) -> Result<()> {
    println!("Amazon Used Price Search");
    println!("Type a search term, 'open <n>' to open a result, or 'quit' to exit.");

    let mut updates = searcher.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            if updates.borrow_and_update().loading {
                eprintln!("Searching...");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        if line == "quit" || line == "exit" {
            break;
        }

        if let Some(position) = line.strip_prefix("open ") {
            let result = position
                .trim()
                .parse::<usize>()
                .context("Expected a listing number")
                .and_then(|n| open_listing(&searcher.state().listings, n));
            if let Err(e) = result {
                eprintln!("{:#}", e);
            }
            continue;
        }

        let state = searcher.search(line).await;
        if let Err(e) = print_state(&state, json) {
            eprintln!("{:#}", e);
        }
    }

    Ok(())
}

fn print_state(state: &SearchState, json: bool) -> Result<()> {
    println!("{}", render_state(state, json)?);
    Ok(())
}

fn print_listings(listings: &[Listing], json: bool) -> Result<()> {
    println!("{}", render_listings(listings, json)?);
    Ok(())
}

/// Listings are de-duplicated in every format so positions match `open <n>`
fn render_state(state: &SearchState, json: bool) -> Result<String> {
    let listings = models::dedup_by_key(&state.listings);

    if json {
        let state = SearchState {
            listings,
            ..state.clone()
        };
        return Ok(serde_json::to_string_pretty(&state)?);
    }

    match &state.error_message {
        Some(message) if listings.is_empty() => Ok(message.clone()),
        Some(message) => Ok(format!("{}\n{}", message, render_entries(&listings))),
        None => render_listings(&listings, false),
    }
}

fn render_listings(listings: &[Listing], json: bool) -> Result<String> {
    let listings = models::dedup_by_key(listings);

    if json {
        return Ok(serde_json::to_string_pretty(&listings)?);
    }

    if listings.is_empty() {
        return Ok("No results yet".to_string());
    }

    Ok(render_entries(&listings))
}

fn render_entries(listings: &[Listing]) -> String {
    listings
        .iter()
        .enumerate()
        .map(|(i, listing)| listing.format_terminal_entry(i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn open_listing(listings: &[Listing], position: usize) -> Result<()> {
    let listing = position
        .checked_sub(1)
        .and_then(|index| models::dedup_by_key(listings).into_iter().nth(index))
        .with_context(|| format!("No listing #{} in the current results", position))?;

    tracing::info!("Opening {}", listing.url);
    opener::open_url(&listing.url)
}

/// Test URL fetching - downloads and prints HTML response
async fn test_url_fetch(url: &str, save_path: Option<&str>, config: &Config) -> Result<()> {
    println!("Testing URL fetch: {}", url);
    println!("{}", "=".repeat(80));
    println!("User-Agent: {}", config.user_agent);

    let client = http_client::create_http_client(&config.user_agent, config.request_timeout())?;

    println!("Sending request...");
    let response = client.get(url).send().await?;

    println!("Status: {}", response.status());
    println!("\nResponse Headers:");
    for (name, value) in response.headers() {
        println!("  {}: {:?}", name, value);
    }

    println!("{}", "=".repeat(80));

    let body = response.text().await?;

    // Save to file if requested
    if let Some(path) = save_path {
        std::fs::write(path, &body)?;
        println!("HTML saved to: {}", path);
        println!("Run with --html-file {} to extract listings from it", path);
    } else {
        println!("{}", body);
    }

    println!("{}", "=".repeat(80));
    println!("Total length: {} bytes", body.len());

    let listings = AmazonExtractor::extract(&body);
    println!("Listings extracted: {}", listings.len());

    // Check for common CAPTCHA indicators
    let lower_body = body.to_lowercase();
    if lower_body.contains("captcha") || lower_body.contains("robot check") {
        println!("\n⚠️  WARNING: Response may be a CAPTCHA or robot check page!");
        println!("Consider changing user_agent in {}", config::CONFIG_PATH);
    }

    Ok(())
}
