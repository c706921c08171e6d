// WHY: one error type for the whole library so workers can tell fatal configuration
// problems apart from per-file damage without string matching

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed game stream in {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("could not find FEN {position} in the fix-FEN source")]
    MissingCorrection { position: String },

    #[error("detected a duplicate of test {test_id} in directory {}", directory.display())]
    DuplicateTest { test_id: String, directory: PathBuf },

    #[error("book match pattern cannot be empty")]
    EmptyPattern,

    #[error("invalid book match pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid test metadata in {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },

    #[error("invalid report row {line} in {}: {reason}", path.display())]
    InvalidReportRow { path: PathBuf, line: usize, reason: String },
}

impl AnalysisError {
    /// Fatal errors abort the whole run; the rest only cost the file they occurred in.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io { .. } | Self::MalformedRecord { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classifies a failure while streaming games: corrupt or truncated data is a
    /// malformed stream, anything else an I/O error.
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
                Self::MalformedRecord {
                    path: path.into(),
                    reason: source.to_string(),
                }
            }
            _ => Self::io(path, source),
        }
    }
}
