// WHY: chunks are fixed up front and drained by at most `concurrency` blocking workers;
// each chunk runs start to finish on one worker, so file order inside a chunk holds

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::aggregation::AggregationTable;
use crate::analyzer::{analyze_file, FileStats};
use crate::error::AnalysisError;
use crate::fixfen::FixFenTable;
use crate::reader::ReaderConfig;

/// Chunks per worker; extra chunks even out files of unequal size
pub const CHUNKS_PER_WORKER: usize = 4;

/// Splits `items` into `ceil(n / ceil(n / target_chunks))` groups of equal size except
/// the last, preserving order.
pub fn split_chunks<T: Clone>(items: &[T], target_chunks: NonZeroUsize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = items.len().div_ceil(target_chunks.get());
    items.chunks(chunk_size).map(<[T]>::to_vec).collect()
}

/// Everything a worker reads while analyzing files
pub struct AnalysisContext {
    pub table: AggregationTable,
    pub fixfen: Option<FixFenTable>,
    pub reader: ReaderConfig,
}

impl AnalysisContext {
    pub fn new(table: AggregationTable, fixfen: Option<FixFenTable>) -> Self {
        Self {
            table,
            fixfen,
            reader: ReaderConfig::default(),
        }
    }
}

/// Result of draining every chunk
#[derive(Debug, Default)]
pub struct ParallelOutcome {
    pub file_stats: Vec<FileStats>,
    pub chunks_completed: usize,
    pub chunks_failed: usize,
}

/// Progress bar over chunks; hidden when `enabled` is false.
pub fn chunk_progress_bar(chunk_count: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(chunk_count as u64);
    let style = ProgressStyle::with_template("Progress: {pos}/{len} chunks [{elapsed_precise}] {wide_bar}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn process_chunk(
    files: &[PathBuf],
    context: &AnalysisContext,
    abort: &AtomicBool,
) -> Result<Vec<FileStats>, AnalysisError> {
    let mut stats = Vec::with_capacity(files.len());
    for path in files {
        if abort.load(Ordering::Acquire) {
            debug!("Abort requested, leaving chunk early");
            break;
        }
        match analyze_file(path, &context.table, context.fixfen.as_ref(), &context.reader) {
            Ok(file_stats) => stats.push(file_stats),
            Err(e) => {
                abort.store(true, Ordering::Release);
                return Err(e);
            }
        }
    }
    Ok(stats)
}

/// Runs every chunk on a pool of `concurrency` blocking workers and waits for all.
///
/// Per-file failures are recorded in the returned stats. The first fatal error stops
/// workers from starting new files and is returned once the pool has drained.
pub async fn process_files_parallel(
    chunks: Vec<Vec<PathBuf>>,
    context: Arc<AnalysisContext>,
    concurrency: NonZeroUsize,
    progress: ProgressBar,
) -> Result<ParallelOutcome> {
    let chunk_count = chunks.len();
    info!("Processing {} chunks with concurrency {}", chunk_count, concurrency);

    let semaphore = Arc::new(Semaphore::new(concurrency.get()));
    let abort = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(chunk_count);

    for chunk in chunks {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("Worker pool semaphore closed")?;
        let context = Arc::clone(&context);
        let abort = Arc::clone(&abort);
        let completed = Arc::clone(&completed);
        let progress = progress.clone();

        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let result = process_chunk(&chunk, &context, &abort);
            let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
            progress.inc(1);
            debug!("Chunk finished ({}/{})", done, chunk_count);
            result
        }));
    }

    let mut outcome = ParallelOutcome::default();
    let mut fatal: Option<AnalysisError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(stats)) => {
                outcome.chunks_completed += 1;
                outcome.file_stats.extend(stats);
            }
            Ok(Err(e)) => {
                outcome.chunks_failed += 1;
                fatal.get_or_insert(e);
            }
            Err(join_error) => {
                outcome.chunks_failed += 1;
                error!("Chunk worker failed: {}", join_error);
            }
        }
    }
    progress.finish_and_clear();

    if let Some(e) = fatal {
        error!("Aborting run: {}", e);
        return Err(e.into());
    }

    info!(
        "All {} chunks joined ({} completed, {} failed)",
        completed.load(Ordering::Acquire),
        outcome.chunks_completed,
        outcome.chunks_failed
    );
    Ok(outcome)
}
