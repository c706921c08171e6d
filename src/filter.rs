use regex_automata::meta::Regex;
use std::path::PathBuf;
use tracing::info;

use crate::error::AnalysisError;
use crate::metadata::{MetadataIndex, TestMetadata};

/// Keeps files whose test batch used a book matching a pattern.
///
/// The pattern must match the whole book name. Files without metadata or without a
/// `book` entry never match and are dropped under either polarity.
#[derive(Debug, Clone)]
pub struct BookFilter {
    regex: Regex,
    invert: bool,
}

impl BookFilter {
    pub fn new(pattern: &str, invert: bool) -> Result<Self, AnalysisError> {
        if pattern.is_empty() {
            return Err(AnalysisError::EmptyPattern);
        }
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).map_err(|e| AnalysisError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex, invert })
    }

    pub fn keeps(&self, metadata: Option<&TestMetadata>) -> bool {
        match metadata.and_then(|m| m.book.as_deref()) {
            Some(book) => self.regex.is_match(book) != self.invert,
            None => false,
        }
    }
}

/// Keeps files whose test batch is flagged as SPRT.
pub fn keeps_sprt(metadata: Option<&TestMetadata>) -> bool {
    metadata.and_then(|m| m.sprt).unwrap_or(false)
}

/// Metadata predicates applied to the discovered file list, in order
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    pub book: Option<BookFilter>,
    pub sprt_only: bool,
}

impl FilterPipeline {
    pub fn is_empty(&self) -> bool {
        self.book.is_none() && !self.sprt_only
    }

    /// Narrows `files` in place, preserving their order.
    pub fn apply(&self, files: &mut Vec<PathBuf>, index: &MetadataIndex) {
        if let Some(book) = &self.book {
            let before = files.len();
            files.retain(|path| book.keeps(index.lookup(path)));
            info!(
                "Book filter{} kept {} of {} files",
                if book.invert { " (inverted)" } else { "" },
                files.len(),
                before
            );
        }

        if self.sprt_only {
            let before = files.len();
            files.retain(|path| keeps_sprt(index.lookup(path)));
            info!("SPRT filter kept {} of {} files", files.len(), before);
        }
    }
}
