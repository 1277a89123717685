mod assemble;
mod config;
mod error;
mod extract;
mod output;
mod page;
mod record;
mod runner;
mod tasks;
mod validate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::assemble::Outcome;
use crate::config::Settings;
use crate::page::chrome::ChromeProvider;
use crate::page::snapshot::SnapshotSite;
use crate::page::PageProvider;
use crate::tasks::Task;

#[derive(Parser)]
#[command(name = "recipe_scraper", about = "Recipe page scraper driving headless Chromium")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every link in the link list and append recipes to the CSV
    Run {
        /// Link list, one `category|url` per line
        #[arg(short, long, env = "RECIPES_INPUT_PATH")]
        input: Option<PathBuf>,
        /// CSV file to append to
        #[arg(short, long, env = "RECIPES_OUTPUT_PATH")]
        output: Option<PathBuf>,
        /// Browser sessions running at once
        #[arg(short = 'j', long, env = "RECIPES_CONCURRENCY")]
        concurrency: Option<usize>,
    },
    /// Scrape a single URL and print the record as JSON
    One {
        url: String,
        #[arg(short, long, default_value = "Uncategorized")]
        category: String,
    },
    /// Run the extractor on a saved HTML file (no browser)
    Inspect {
        file: PathBuf,
        /// URL recorded in the output
        #[arg(long, default_value = "file://snapshot")]
        url: String,
        #[arg(short, long, default_value = "Uncategorized")]
        category: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    match cli.command {
        Commands::Run {
            input,
            output,
            concurrency,
        } => {
            run(settings.with_run_overrides(input, output, concurrency)?).await
        }
        Commands::One { url, category } => {
            let provider = ChromeProvider::new(settings.browser.clone());
            print_single(&provider, single_task(url, category), &settings).await
        }
        Commands::Inspect {
            file,
            url,
            category,
        } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let site = SnapshotSite::new().with_page(url.clone(), html);
            print_single(&site, single_task(url, category), &settings).await
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let tasks = tasks::load_tasks(&settings.input_path)?;
    let t0 = Instant::now();

    println!(
        "Scraping {} total links with concurrency={} (headless={}).",
        tasks.len(),
        settings.concurrency,
        settings.browser.headless
    );

    let mut sink = output::RecipeSink::open(&settings.output_path)?;
    let provider = Arc::new(ChromeProvider::new(settings.browser.clone()));
    let stats = runner::run_batch(
        provider,
        tasks,
        settings.concurrency,
        settings.timeouts(),
        &mut sink,
    )
    .await?;

    println!(
        "\nWrote {} valid recipes to '{}' in {} using concurrency={} ({} skipped, {} errors).",
        stats.written,
        sink.path().display(),
        format_duration(t0.elapsed()),
        settings.concurrency,
        stats.rejected,
        stats.errored,
    );
    Ok(())
}

fn single_task(url: String, category: String) -> Task {
    Task {
        category_name: category,
        url,
        sequence_id: 1,
    }
}

async fn print_single<P: PageProvider>(
    provider: &P,
    task: Task,
    settings: &Settings,
) -> anyhow::Result<()> {
    match assemble::assemble(provider, &task, &settings.timeouts()).await {
        Outcome::Assembled(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Outcome::Rejected(reason) => println!("Skipped {}: {}", task.url, reason),
        Outcome::Errored(e) => println!("Failed {}: {}", task.url, e),
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.2}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
