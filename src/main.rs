use anyhow::Result;
use clap::Parser;
use console::style;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daily_lexicon::extractors::session::default_launcher;
use daily_lexicon::extractors::MultiTierExtractor;
use daily_lexicon::http::HttpClient;
use daily_lexicon::pipeline::RunSummary;
use daily_lexicon::utils::extract_domain;
use daily_lexicon::{exit_code_for, Cli, Commands, Config, DailyPipeline, LogFormat};

fn init_logging(cli: &Cli, log_file: Option<&Path>) -> Result<()> {
    let default_filter = if cli.verbose {
        "daily_lexicon=debug"
    } else if cli.quiet {
        "daily_lexicon=warn"
    } else {
        "daily_lexicon=info"
    };

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs_err::create_dir_all(parent)?;
            }
            let file = fs_err::OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let text_layer = (cli.log_format == LogFormat::Text)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json_layer = (cli.log_format == LogFormat::Json)
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} {} {}",
        style("Run complete").green().bold(),
        summary.window.display_date,
        summary.window.slot
    );
    if let Some(status) = summary.bundle_status {
        println!("  Episode: {}", style(status.as_str()).cyan());
    }
    if let Some(vocabulary) = &summary.vocabulary {
        println!("  Vocabulary: {} items", vocabulary.count);
        println!("    {}", vocabulary.json_path.display());
        println!("    {}", vocabulary.csv_path.display());
    }
    if let Some(report) = &summary.report_path {
        println!("  Report: {}", report.display());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Run { date, step, demo } => {
            let pipeline = DailyPipeline::from_config(config);
            let window = pipeline.window_for(date.as_deref())?;
            let log_file = pipeline
                .config()
                .paths
                .logs_dir
                .join(format!("pipeline_{}.log", window.compact_date));
            init_logging(&cli, Some(&log_file))?;

            let summary = if *demo {
                pipeline.demo().await?
            } else {
                pipeline.run(&window, *step).await?
            };
            print_summary(&summary);
        }
        Commands::Config { show } => {
            init_logging(&cli, None)?;
            if *show {
                config.display();
            } else {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::config_path()?,
                };
                if path.exists() {
                    println!("Configuration already exists: {}", path.display());
                } else {
                    config.save(&path)?;
                    println!("{} {}", style("Wrote default configuration to").green(), path.display());
                }
            }
        }
        Commands::Sources => {
            init_logging(&cli, None)?;
            let http = HttpClient::from_config(&config)?;
            let launcher = default_launcher(&config.browser);
            let extractor = MultiTierExtractor::from_config(&config, http, launcher.clone());

            println!("Source:");
            println!(
                "  • {} on {} (slot {})",
                config.crawl.program_name,
                extract_domain(&config.crawl.target_url).unwrap_or_else(|| config.crawl.target_url.clone()),
                config.crawl.slot
            );
            println!("  • Static fallback: {}", config.crawl.fallback_url);
            println!("Extraction tiers:");
            for name in extractor.tier_names() {
                println!("  • {}", name);
            }
            if !launcher.is_available() {
                println!("  {}", style("Browser automation unavailable; the static fallback will be used").yellow());
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Pipeline failed: {:#}", e);
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(exit_code_for(&e));
    }
}
