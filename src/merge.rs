// WHY: reports from earlier runs may carry the same opening with different move
// counters; merging folds them onto one row per board, side, castling and en passant

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::aggregation::{OutcomeCounters, TableSnapshot};
use crate::error::AnalysisError;
use crate::reader::{open_record_stream, ReaderConfig};
use crate::report::CSV_HEADER;

/// Rows keyed on the first four FEN fields, in first-seen order.
///
/// Each row keeps the position it was first seen with (at most six fields) and the
/// summed counters of every position sharing its key.
#[derive(Debug, Clone, Default)]
pub struct PositionMerge {
    rows: Vec<(String, OutcomeCounters)>,
    index: HashMap<String, usize>,
    games: u64,
}

impl PositionMerge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a run's table. Keys with fewer than four fields merge only with
    /// themselves.
    pub fn from_snapshot(snapshot: TableSnapshot) -> Self {
        let mut merge = Self::new();
        for (position, counters) in snapshot.entries {
            let key = merge_key(&position).unwrap_or_else(|| position.clone());
            merge.add(key, &position, &counters);
        }
        merge.games = snapshot.games_aggregated;
        merge
    }

    fn add(&mut self, key: String, position: &str, counters: &OutcomeCounters) {
        match self.index.get(&key) {
            Some(&row) => self.rows[row].1.merge(counters),
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push((display_position(position), *counters));
            }
        }
    }

    /// Adds every row of a CSV report as written by [`crate::report::Report::write_csv`].
    ///
    /// Blank lines and the header are skipped. A row without four counters fields, or
    /// whose FEN has fewer than four fields, fails the whole merge.
    pub fn add_csv<R: BufRead>(&mut self, reader: R, source: &Path) -> Result<usize, AnalysisError> {
        let mut added = 0usize;
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| AnalysisError::io(source, e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with("FEN") {
                continue;
            }
            let invalid = |reason: String| AnalysisError::InvalidReportRow {
                path: source.to_path_buf(),
                line: number + 1,
                reason,
            };

            let (position, counters) = parse_report_row(line).map_err(invalid)?;
            let key = merge_key(position).ok_or_else(|| invalid(format!("incomplete FEN {position:?}")))?;
            self.games += counters.total();
            self.add(key, position, &counters);
            added += 1;
        }
        Ok(added)
    }

    /// Loads a plain or gzip-compressed report file.
    pub fn load_csv(&mut self, path: impl AsRef<Path>, config: &ReaderConfig) -> Result<usize, AnalysisError> {
        let path = path.as_ref();
        let stream = open_record_stream(path, config)?;
        let added = self.add_csv(stream, path)?;
        info!("Merged {} rows from {}", added, path.display());
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_snapshot(self) -> TableSnapshot {
        TableSnapshot {
            entries: self.rows,
            games_aggregated: self.games,
        }
    }
}

/// Folds `sources` into `snapshot`, keyed on the first four FEN fields.
pub fn merge_reports(
    snapshot: TableSnapshot,
    sources: &[PathBuf],
    config: &ReaderConfig,
) -> Result<TableSnapshot, AnalysisError> {
    let mut merge = PositionMerge::from_snapshot(snapshot);
    for source in sources {
        merge.load_csv(source, config)?;
    }
    debug!("{} positions after merging {} reports", merge.len(), sources.len());
    Ok(merge.into_snapshot())
}

/// First four whitespace-separated FEN fields, or `None` when there are fewer.
pub fn merge_key(position: &str) -> Option<String> {
    let mut fields = position.split_whitespace();
    let key = [fields.next()?, fields.next()?, fields.next()?, fields.next()?].join(" ");
    Some(key)
}

fn display_position(position: &str) -> String {
    position.split_whitespace().take(6).collect::<Vec<_>>().join(" ")
}

fn parse_report_row(line: &str) -> Result<(&str, OutcomeCounters), String> {
    let mut fields = line.split(',').map(str::trim);
    let position = fields.next().unwrap_or_default();
    let mut counter = |name: &str| -> Result<u64, String> {
        let value = fields
            .next()
            .ok_or_else(|| format!("missing {name} column, expected {CSV_HEADER:?}"))?;
        value
            .parse::<u64>()
            .map_err(|e| format!("{name} {value:?} is not a count: {e}"))
    };
    let wins = counter("Wins")?;
    let draws = counter("Draws")?;
    let losses = counter("Losses")?;
    Ok((position, OutcomeCounters::new(wins, draws, losses)))
}
