use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feed_harvester::drivers::ChromiumFactory;
use feed_harvester::export::{to_json, write_csv};
use feed_harvester::{HarvestPipeline, HarvestTarget, HarvestTimings, SiteSelectors};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

/// Harvest posts from an infinite-scroll feed.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Feed URL to harvest
    url: String,

    /// Seconds to keep scrolling before extracting
    #[arg(long, default_value_t = 60)]
    scroll_secs: u64,

    /// Visit each post to read its author
    #[arg(long)]
    resolve_usernames: bool,

    /// Concurrent detail-page sessions
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// JSON file overriding the default selectors
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// JSON file overriding the default timings
    #[arg(long)]
    timings: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Write here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let selectors = match &cli.selectors {
        Some(path) => SiteSelectors::load(path)
            .with_context(|| format!("reading selectors from {}", path.display()))?,
        None => SiteSelectors::default(),
    };
    let timings = match &cli.timings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading timings from {}", path.display()))?;
            serde_json::from_str::<HarvestTimings>(&raw).context("parsing timings")?
        }
        None => HarvestTimings::default(),
    };

    let factory = ChromiumFactory::launch(!cli.headed)
        .await?
        .with_navigation_timeout(timings.navigation_timeout);
    let pipeline = HarvestPipeline::new(factory)
        .with_selectors(selectors)
        .with_timings(timings)
        .with_concurrency(cli.concurrency);

    let target = HarvestTarget::new(&cli.url)
        .with_scroll_budget(cli.scroll_secs)
        .with_username_resolution(cli.resolve_usernames);

    let mut last_decile = 0;
    let mut progress = |fraction: f64| {
        let decile = (fraction * 10.0) as u32;
        if decile > last_decile {
            last_decile = decile;
            info!("Extracted {}%", decile * 10);
        }
    };

    let result = pipeline.execute(&target, Some(&mut progress)).await?;
    for issue in &result.errors {
        info!(context = %issue.context, "{}", issue.message);
    }

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    match cli.format {
        Format::Csv => write_csv(&result.records, &mut out)?,
        Format::Json => writeln!(out, "{}", to_json(&result)?)?,
    }
    out.flush()?;

    info!(records = result.records.len(), "Done");
    Ok(())
}
