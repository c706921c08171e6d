// WHY: per-game state machine over the header stream; a game contributes to the table
// only once its headers are complete and it has a usable result

use pgn_reader::{BufferedReader, RawHeader, Skip, Visitor};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

use crate::aggregation::{AggregationTable, GameOutcome};
use crate::error::AnalysisError;
use crate::fixfen::{normalize_position, FixFenTable};
use crate::reader::{open_record_stream, ReaderConfig};

/// Position of a game without a `FEN` header
pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// `Termination` values whose games must not be counted
pub const DISQUALIFYING_TERMINATIONS: &[&str] = &[
    "time forfeit",
    "abandoned",
    "stalled connection",
    "illegal move",
    "unterminated",
];

#[derive(Debug, Clone)]
struct GameState {
    outcome: GameOutcome,
    position: String,
    valid: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            outcome: GameOutcome::Unknown,
            position: STARTING_POSITION.to_string(),
            valid: true,
        }
    }
}

/// Game counts for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameCounts {
    pub games_seen: u64,
    pub games_aggregated: u64,
    pub games_excluded: u64,
}

/// Visitor that upserts every countable game into the shared table.
///
/// Move text is never parsed: every game is skipped once its headers are done.
pub struct GameAnalyzer<'a> {
    table: &'a AggregationTable,
    fixfen: Option<&'a FixFenTable>,
    state: GameState,
    counts: GameCounts,
    // a fatal error raised in `end_headers`, handed out by `end_game`
    failure: Option<AnalysisError>,
}

impl<'a> GameAnalyzer<'a> {
    pub fn new(table: &'a AggregationTable, fixfen: Option<&'a FixFenTable>) -> Self {
        Self {
            table,
            fixfen,
            state: GameState::default(),
            counts: GameCounts::default(),
            failure: None,
        }
    }

    pub fn counts(&self) -> GameCounts {
        self.counts
    }

    fn aggregate(&mut self) -> Result<(), AnalysisError> {
        let key = normalize_position(&self.state.position, self.fixfen)?;
        self.table.upsert(&key, self.state.outcome);
        self.table.mark_game_aggregated();
        self.counts.games_aggregated += 1;
        Ok(())
    }
}

impl Visitor for GameAnalyzer<'_> {
    type Result = Result<(), AnalysisError>;

    fn begin_game(&mut self) {
        self.state = GameState::default();
        self.counts.games_seen += 1;
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        match key {
            b"Result" => self.state.outcome = GameOutcome::from_result_tag(&value.decode_utf8_lossy()),
            b"FEN" => self.state.position = value.decode_utf8_lossy().into_owned(),
            b"Termination" => {
                if DISQUALIFYING_TERMINATIONS.contains(&&*value.decode_utf8_lossy()) {
                    self.state.valid = false;
                }
            }
            _ => {}
        }
    }

    fn end_headers(&mut self) -> Skip {
        if self.state.outcome == GameOutcome::Unknown || !self.state.valid {
            self.counts.games_excluded += 1;
        } else if let Err(e) = self.aggregate() {
            self.failure = Some(e);
        }
        Skip(true)
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn end_game(&mut self) -> Self::Result {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Streams every game in `reader` through `analyzer` and returns the game count.
///
/// Stops at the first fatal error; games visited before it stay aggregated.
pub fn analyze_stream<R: Read>(
    reader: R,
    source: &Path,
    analyzer: &mut GameAnalyzer<'_>,
) -> Result<u64, AnalysisError> {
    let mut games = BufferedReader::new(reader);
    let mut count = 0u64;
    while let Some(outcome) = games
        .read_game(analyzer)
        .map_err(|e| AnalysisError::read(source, e))?
    {
        outcome?;
        count += 1;
    }
    Ok(count)
}

/// Per-file result kept for run statistics
#[derive(Debug, Clone, Serialize)]
pub struct FileStats {
    pub path: String,
    pub games_seen: u64,
    pub games_aggregated: u64,
    pub processing_time_ms: u64,
    /// `success` or `failed`
    pub status: String,
    pub error: Option<String>,
}

/// Streams one file into `table`.
///
/// Recoverable failures (unreadable or malformed file) come back as a `failed`
/// [`FileStats`]; games aggregated before the failure stay aggregated. Fatal errors
/// are returned as `Err`.
pub fn analyze_file(
    path: &Path,
    table: &AggregationTable,
    fixfen: Option<&FixFenTable>,
    config: &ReaderConfig,
) -> Result<FileStats, AnalysisError> {
    let start = Instant::now();
    let mut analyzer = GameAnalyzer::new(table, fixfen);

    let outcome = open_record_stream(path, config)
        .and_then(|stream| analyze_stream(stream, path, &mut analyzer));
    let counts = analyzer.counts();

    let mut stats = FileStats {
        path: path.display().to_string(),
        games_seen: counts.games_seen,
        games_aggregated: counts.games_aggregated,
        processing_time_ms: start.elapsed().as_millis() as u64,
        status: "success".to_string(),
        error: None,
    };

    match outcome {
        Ok(records) => {
            debug!(
                "Analyzed {}: {} records, {} aggregated, {} excluded",
                path.display(),
                records,
                counts.games_aggregated,
                counts.games_excluded
            );
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Error when parsing {}: {}", path.display(), e);
            stats.status = "failed".to_string();
            stats.error = Some(e.to_string());
        }
    }

    Ok(stats)
}
