// WHY: the parallel phase is a hard barrier; nothing reads the table until every worker
// has joined and the last Arc to it is released

use anyhow::{Context, Result};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::aggregation::AggregationTable;
use crate::analyzer::FileStats;
use crate::discovery::{collect_discovered_files, DiscoveryConfig};
use crate::filter::{BookFilter, FilterPipeline};
use crate::fixfen::FixFenTable;
use crate::merge::merge_reports;
use crate::metadata::{load_metadata, DuplicateTest};
use crate::parallel_processing::{
    chunk_progress_bar, process_files_parallel, split_chunks, AnalysisContext, CHUNKS_PER_WORKER,
};
use crate::reader::ReaderConfig;
use crate::report::{Report, ReportOptions};

/// Everything one analysis run needs, independent of the command line
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub root: PathBuf,
    pub recursive: bool,
    pub concurrency: NonZeroUsize,
    pub book_pattern: Option<String>,
    pub invert_book: bool,
    pub sprt_only: bool,
    pub allow_duplicates: bool,
    pub fix_fen_source: Option<PathBuf>,
    /// Earlier CSV reports folded into this run's rows by their first four FEN fields
    pub merge_sources: Vec<PathBuf>,
    pub report: ReportOptions,
    pub show_progress: bool,
}

impl AnalysisConfig {
    /// Defaults for scanning `root`: recursive, one worker per CPU, no filters.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            concurrency: NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN),
            book_pattern: None,
            invert_book: false,
            sprt_only: false,
            allow_duplicates: false,
            fix_fen_source: None,
            merge_sources: Vec::new(),
            report: ReportOptions::default(),
            show_progress: false,
        }
    }

    fn filters(&self) -> Result<FilterPipeline> {
        let book = self
            .book_pattern
            .as_deref()
            .map(|pattern| BookFilter::new(pattern, self.invert_book))
            .transpose()?;
        Ok(FilterPipeline {
            book,
            sprt_only: self.sprt_only,
        })
    }
}

/// Machine-readable account of one run, written by `--stats-out`
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    /// Seconds since the Unix epoch
    pub run_start: u64,
    pub total_processing_time_ms: u64,
    pub files_discovered: usize,
    pub files_selected: usize,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub chunks: usize,
    pub games_seen: u64,
    pub games_aggregated: u64,
    pub positions: usize,
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
    pub file_stats: Vec<FileStats>,
}

/// Report of a finished run together with its statistics
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub stats: RunStats,
    pub duplicates: Vec<DuplicateTest>,
}

async fn load_fix_fen(path: &Path) -> Result<FixFenTable> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        FixFenTable::load(&path, &ReaderConfig::default())
            .with_context(|| format!("Failed to load fix-FEN source {}", path.display()))
    })
    .await
    .context("Fix-FEN loading task panicked")?
}

/// Discovery, metadata, filters, parallel aggregation, then the report.
///
/// Fatal errors surface before any report exists; per-file failures only show up in
/// [`RunStats::file_stats`].
pub async fn run_analysis(config: &AnalysisConfig) -> Result<RunOutcome> {
    let run_start = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let start = Instant::now();

    let filters = config.filters()?;

    let discovery_config = DiscoveryConfig {
        recursive: config.recursive,
    };
    let mut files = collect_discovered_files(&config.root, discovery_config).await?;
    let files_discovered = files.len();

    let metadata_files = files.clone();
    let allow_duplicates = config.allow_duplicates;
    let index = tokio::task::spawn_blocking(move || load_metadata(&metadata_files, allow_duplicates))
        .await
        .context("Metadata loading task panicked")??;

    if !filters.is_empty() {
        filters.apply(&mut files, &index);
    }
    let files_selected = files.len();
    info!("{} of {} discovered files selected for analysis", files_selected, files_discovered);

    let fixfen = match &config.fix_fen_source {
        Some(path) => Some(load_fix_fen(path).await?),
        None => None,
    };

    let target_chunks = config.concurrency.saturating_mul(
        NonZeroUsize::new(CHUNKS_PER_WORKER).unwrap_or(NonZeroUsize::MIN),
    );
    let chunks = split_chunks(&files, target_chunks);
    let chunk_count = chunks.len();

    let context = Arc::new(AnalysisContext::new(AggregationTable::new(), fixfen));
    let progress = chunk_progress_bar(chunk_count, config.show_progress);
    let outcome = process_files_parallel(chunks, Arc::clone(&context), config.concurrency, progress).await?;

    let context = Arc::try_unwrap(context)
        .map_err(|_| anyhow::anyhow!("Aggregation table still shared after all workers joined"))?;
    let mut snapshot = context.table.into_snapshot();
    if !config.merge_sources.is_empty() {
        let sources = config.merge_sources.clone();
        snapshot = tokio::task::spawn_blocking(move || merge_reports(snapshot, &sources, &ReaderConfig::default()))
            .await
            .context("Report merging task panicked")??;
    }
    let positions = snapshot.entries.len();
    let report = Report::build(snapshot, &config.report);

    let files_failed = outcome.file_stats.iter().filter(|s| s.status == "failed").count();
    let games_seen = outcome.file_stats.iter().map(|s| s.games_seen).sum();
    let elapsed = start.elapsed();
    info!(
        "Aggregated {} games into {} positions in {:.3}s",
        report.games_aggregated,
        positions,
        elapsed.as_secs_f64()
    );

    let stats = RunStats {
        run_start,
        total_processing_time_ms: elapsed.as_millis() as u64,
        files_discovered,
        files_selected,
        files_analyzed: outcome.file_stats.len() - files_failed,
        files_failed,
        chunks: chunk_count,
        games_seen,
        games_aggregated: report.games_aggregated,
        positions,
        wins: report.totals.wins,
        draws: report.totals.draws,
        losses: report.totals.losses,
        file_stats: outcome.file_stats,
    };

    Ok(RunOutcome {
        report,
        stats,
        duplicates: index.duplicates().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::OutcomeCounters;
    use crate::error::AnalysisError;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_empty_directory_yields_empty_report() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = run_analysis(&AnalysisConfig::new(temp_dir.path())).await.unwrap();
        assert!(outcome.report.rows.is_empty());
        assert_eq!(outcome.stats.chunks, 0);
        assert_eq!(outcome.stats.games_aggregated, 0);
    }

    #[tokio::test]
    async fn test_empty_book_pattern_rejected_before_discovery() {
        let mut config = AnalysisConfig::new("/definitely/not/here");
        config.book_pattern = Some(String::new());
        let err = run_analysis(&config).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<AnalysisError>(), Some(AnalysisError::EmptyPattern)));
    }

    #[tokio::test]
    async fn test_merge_sources_fold_into_report() {
        let temp_dir = TempDir::new().unwrap();
        let start = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";
        write(temp_dir.path(), "pgns/t1-0.pgn", &format!("[Result \"1-0\"]\n[FEN \"{start} 0 1\"]\n\n1-0\n"));
        write(temp_dir.path(), "old.csv", &format!("FEN, Wins, Draws, Losses\n{start} 3 7, 0, 4, 1\n"));

        let mut config = AnalysisConfig::new(temp_dir.path().join("pgns"));
        config.merge_sources = vec![temp_dir.path().join("old.csv")];
        let outcome = run_analysis(&config).await.unwrap();

        assert_eq!(
            outcome.report.rows,
            vec![(format!("{start} 0 1"), OutcomeCounters::new(1, 4, 1))]
        );
        assert_eq!(outcome.stats.games_aggregated, 6);
        assert_eq!(outcome.stats.positions, 1);
    }

    #[tokio::test]
    async fn test_sprt_filter_narrows_input() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "s1-0.pgn", "[Result \"1-0\"]\n[FEN \"S\"]\n\n1-0\n");
        write(temp_dir.path(), "s1.json", r#"{"args":{"sprt":{"elo0":0}}}"#);
        write(temp_dir.path(), "f1-0.pgn", "[Result \"1-0\"]\n[FEN \"F\"]\n\n1-0\n");

        let mut config = AnalysisConfig::new(temp_dir.path());
        config.sprt_only = true;
        let outcome = run_analysis(&config).await.unwrap();

        assert_eq!(outcome.stats.files_discovered, 2);
        assert_eq!(outcome.stats.files_selected, 1);
        let keys: Vec<_> = outcome.report.rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["S"]);
    }
}
