use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use fenwdl::report::DEFAULT_WINDOW_MIN_GAMES;
use fenwdl::{run_analysis, AnalysisConfig, DrawRateWindow, ReportOptions, SortOrder};

#[derive(Parser, Debug)]
#[command(name = "fenwdl")]
#[command(about = "Aggregates win/draw/loss counts per opening position across PGN archives")]
#[command(version)]
struct Args {
    /// Root directory to scan for *.pgn and *.pgn.gz files
    #[arg(long, default_value = "./pgns")]
    dir: PathBuf,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long)]
    concurrency: Option<NonZeroUsize>,

    /// Keep only tests whose book matches this regex
    #[arg(long)]
    match_book: Option<String>,

    /// Keep only tests whose book does NOT match --match-book
    #[arg(long, requires = "match_book")]
    match_book_invert: bool,

    /// Keep only SPRT tests
    #[arg(long)]
    sprt_only: bool,

    /// Warn about duplicate test ids instead of aborting
    #[arg(long)]
    allow_duplicates: bool,

    /// Report only positions whose games all ended the same way
    #[arg(long)]
    conclusive: bool,

    /// Book whose move counters replace reset "0 1" counters (plain or .gz)
    #[arg(long)]
    fix_fen_source: Option<PathBuf>,

    /// Row ordering of the report
    #[arg(long, value_enum, default_value_t = SortOrder::DrawRate)]
    sort: SortOrder,

    /// Drop positions whose draw rate (in %) is below this
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    draw_rate_min: Option<u32>,

    /// Drop positions whose draw rate (in %) is above this
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    draw_rate_max: Option<u32>,

    /// Positions with fewer games are kept whatever their draw rate
    #[arg(long, default_value_t = DEFAULT_WINDOW_MIN_GAMES)]
    draw_rate_games: u64,

    /// Earlier CSV report to merge into this run, keyed on the first four FEN fields (repeatable)
    #[arg(long = "merge", value_name = "CSV")]
    merge: Vec<PathBuf>,

    /// Only scan the top-level directory
    #[arg(long)]
    no_recursive: bool,

    /// CSV report destination
    #[arg(long, default_value = "results.csv")]
    output: PathBuf,

    /// Optional EPD destination listing the reported positions, one per line
    #[arg(long)]
    epd_out: Option<PathBuf>,

    /// Optional JSON run statistics destination
    #[arg(long)]
    stats_out: Option<PathBuf>,

    /// Suppress the console progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn to_config(&self) -> AnalysisConfig {
        let mut config = AnalysisConfig::new(&self.dir);
        config.recursive = !self.no_recursive;
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.book_pattern = self.match_book.clone();
        config.invert_book = self.match_book_invert;
        config.sprt_only = self.sprt_only;
        config.allow_duplicates = self.allow_duplicates;
        config.fix_fen_source = self.fix_fen_source.clone();
        config.merge_sources = self.merge.clone();
        config.report = ReportOptions {
            order: self.sort,
            conclusive_only: self.conclusive,
            window: DrawRateWindow {
                min_percent: self.draw_rate_min,
                max_percent: self.draw_rate_max,
                min_games: self.draw_rate_games,
            },
        };
        config.show_progress = !self.no_progress;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the summary; logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    if !args.dir.exists() {
        anyhow::bail!("Root directory does not exist: {}", args.dir.display());
    }
    if !args.dir.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", args.dir.display());
    }

    let start = Instant::now();
    let config = args.to_config();
    let outcome = run_analysis(&config).await?;

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create report {}", args.output.display()))?;
    outcome
        .report
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("Failed to write report {}", args.output.display()))?;

    if let Some(epd_path) = &args.epd_out {
        let file = File::create(epd_path)
            .with_context(|| format!("Failed to create EPD file {}", epd_path.display()))?;
        outcome
            .report
            .write_epd(BufWriter::new(file))
            .with_context(|| format!("Failed to write EPD file {}", epd_path.display()))?;
        info!("Wrote {} positions to {}", outcome.report.rows.len(), epd_path.display());
    }

    println!("{}", outcome.report.summary());
    println!("Time taken: {:.3}s", start.elapsed().as_secs_f64());
    println!("Wrote results to {}", args.output.display());

    if let Some(stats_path) = &args.stats_out {
        let json = serde_json::to_string_pretty(&outcome.stats).context("Failed to serialize run stats")?;
        std::fs::write(stats_path, json)
            .with_context(|| format!("Failed to write stats to {}", stats_path.display()))?;
        info!("Run statistics written to {}", stats_path.display());
    }

    Ok(())
}
