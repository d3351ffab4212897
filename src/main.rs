use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod control;

use control::{Control, Signals};
use newsticker::config::Config;
use newsticker::feed::FeedFetcher;
use newsticker::ticker::{run_cycle, Ticker, TickerEvent};
use newsticker::util::ticker_line;

#[derive(Parser, Debug)]
#[command(name = "newsticker", about = "Scrolling news headlines from an RSS/Atom feed")]
struct Args {
    /// Config file (default: ~/.config/newsticker/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL, overriding the config file
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Maximum number of headlines
    #[arg(long, value_name = "N")]
    max_items: Option<usize>,

    /// Refresh interval in milliseconds (minimum 60000)
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Fetch once, print, and exit
    #[arg(long)]
    once: bool,

    /// Print one JSON notification per update instead of a ticker line
    #[arg(long)]
    json: bool,
}

/// Get the default config file path (~/.config/newsticker/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("newsticker")
        .join("config.toml"))
}

/// Loads the config file and applies command-line overrides.
fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    let mut config = Config::load(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(url) = &args.url {
        config.feed_url = url.clone();
    }
    if let Some(max_items) = args.max_items {
        config.max_items = max_items;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.update_interval_ms = interval_ms;
    }

    Ok(config)
}

fn init_tracing(level: &str) {
    // RUST_LOG wins; otherwise the configured level with noisy HTTP internals held back
    let default = format!("{level},reqwest=warn,hyper=warn,hyper_util=warn");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints one update.
///
/// Ticker lines go to stdout and errors to stderr, so the last good line
/// stays on screen when a refresh fails. JSON mode writes both to stdout.
fn emit(event: &TickerEvent, config: &Config, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(event).context("Failed to serialize update")?;
        println!("{line}");
        return Ok(());
    }

    match event {
        TickerEvent::News { items } if items.is_empty() => println!("No news items"),
        TickerEvent::News { items } => println!(
            "{}",
            ticker_line(
                items.iter().map(|item| item.title.as_str()),
                &config.separator,
                config.max_line_width,
            )
        ),
        TickerEvent::Error { message } => eprintln!("{message}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args)?;
    init_tracing(&config.log_level);

    let fetcher = Arc::new(FeedFetcher::new().context("Failed to create HTTP client")?);

    if args.once {
        let event = run_cycle(fetcher.as_ref(), &config.feed_source()).await;
        emit(&event, &config, args.json)?;
        if matches!(event, TickerEvent::Error { .. }) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let (event_tx, mut event_rx) = mpsc::channel::<TickerEvent>(16);
    let mut ticker = Ticker::new(fetcher, event_tx);
    ticker.set_reload_on_suspend(config.reload_on_suspend);
    ticker.configure(config.feed_source());

    let mut signals = Signals::new().context("Failed to install signal handlers")?;

    loop {
        tokio::select! {
            biased;

            control = signals.recv() => match control {
                Control::Shutdown => break,
                Control::Reload => match load_config(&args) {
                    Ok(reloaded) => {
                        tracing::info!(feed_url = %reloaded.feed_url, "Configuration reloaded");
                        config = reloaded;
                        ticker.set_reload_on_suspend(config.reload_on_suspend);
                        ticker.configure(config.feed_source());
                    }
                    Err(e) => {
                        tracing::warn!(error = %format!("{e:#}"), "Reload failed, keeping current configuration");
                    }
                },
                Control::Suspend => {
                    tracing::debug!("Suspended");
                    ticker.suspend();
                }
                Control::Resume => {
                    tracing::debug!("Resumed");
                    ticker.resume();
                }
            },

            maybe_event = event_rx.recv() => match maybe_event {
                Some(event) => emit(&event, &config, args.json)?,
                None => break,
            },
        }
    }

    ticker.stop();
    Ok(())
}
