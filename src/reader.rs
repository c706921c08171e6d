use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::error::AnalysisError;

/// Configuration for file reading behavior
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Buffer size for the decoded stream (default: 64KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
        }
    }
}

/// True when the path carries a gzip suffix.
pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Opens `path` as a buffered character stream, transparently inflating `.gz` files.
///
/// Multi-member gzip archives (as produced by appending runs) are read to the end.
pub fn open_record_stream(
    path: impl AsRef<Path>,
    config: &ReaderConfig,
) -> Result<Box<dyn BufRead + Send>, AnalysisError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;

    if is_gzip(path) {
        debug!("Opening gzip stream: {}", path.display());
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(config.buffer_size, decoder)))
    } else {
        debug!("Opening plain stream: {}", path.display());
        Ok(Box::new(BufReader::with_capacity(config.buffer_size, file)))
    }
}
