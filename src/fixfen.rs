// WHY: some match runners rewrite the move counters of every opening FEN to "0 1";
// a reference book restores the real counters so identical openings share a key

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::reader::{open_record_stream, ReaderConfig};

/// Trailing move counters that mark a FEN whose counters were reset
pub const RESET_COUNTERS_SUFFIX: &str = " 0 1";

/// Halfmove clock and fullmove number of a reference position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCounters {
    pub halfmove: u32,
    pub fullmove: u32,
}

/// Reference move counters keyed by the first four FEN fields
#[derive(Debug, Clone, Default)]
pub struct FixFenTable {
    entries: HashMap<String, MoveCounters>,
}

impl FixFenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads whitespace-separated `board side castling ep halfmove fullmove` lines.
    ///
    /// Lines lacking six fields, or with a non-numeric or zero fullmove, are ignored.
    pub fn from_reader<R: BufRead>(reader: R, source: &Path) -> Result<Self, AnalysisError> {
        let mut table = Self::new();
        let mut ignored = 0usize;

        for line in reader.lines() {
            let line = line.map_err(|e| AnalysisError::io(source, e))?;
            match parse_reference_line(&line) {
                Some((prefix, counters)) => table.insert(prefix, counters),
                None => ignored += 1,
            }
        }

        debug!("Ignored {} reference lines without usable move counters", ignored);
        Ok(table)
    }

    /// Loads a plain or gzip-compressed reference file.
    pub fn load(path: impl AsRef<Path>, config: &ReaderConfig) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let stream = open_record_stream(path, config)?;
        let table = Self::from_reader(stream, path)?;
        info!("Read {} reference positions from {}", table.len(), path.display());
        Ok(table)
    }

    /// Inserts `counters` unless an entry with a lower or equal fullmove is present.
    pub fn insert(&mut self, prefix: String, counters: MoveCounters) {
        self.entries
            .entry(prefix)
            .and_modify(|existing| {
                if counters.fullmove < existing.fullmove {
                    *existing = counters;
                }
            })
            .or_insert(counters);
    }

    pub fn get(&self, prefix: &str) -> Option<MoveCounters> {
        self.entries.get(prefix).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restores the move counters of a position ending in `" 0 1"`.
    ///
    /// Positions without that suffix come back unchanged. A suffixed position whose
    /// prefix is not in the table is [`AnalysisError::MissingCorrection`].
    pub fn correct<'a>(&self, position: &'a str) -> Result<Cow<'a, str>, AnalysisError> {
        let Some(prefix) = position
            .strip_suffix(RESET_COUNTERS_SUFFIX)
            .filter(|prefix| !prefix.is_empty())
        else {
            return Ok(Cow::Borrowed(position));
        };

        match self.get(prefix) {
            Some(counters) => Ok(Cow::Owned(format!(
                "{prefix} {} {}",
                counters.halfmove, counters.fullmove
            ))),
            None => Err(AnalysisError::MissingCorrection {
                position: prefix.to_string(),
            }),
        }
    }
}

/// Applies `table` when one is configured; otherwise the position is its own key.
pub fn normalize_position<'a>(
    position: &'a str,
    table: Option<&FixFenTable>,
) -> Result<Cow<'a, str>, AnalysisError> {
    match table {
        Some(table) => table.correct(position),
        None => Ok(Cow::Borrowed(position)),
    }
}

fn parse_reference_line(line: &str) -> Option<(String, MoveCounters)> {
    let mut fields = line.split_whitespace();
    let prefix = [fields.next()?, fields.next()?, fields.next()?, fields.next()?].join(" ");
    let halfmove = fields.next()?.parse::<u32>().ok()?;
    let fullmove = fields.next()?.parse::<u32>().ok()?;
    if fullmove == 0 {
        return None;
    }
    Some((prefix, MoveCounters { halfmove, fullmove }))
}
