use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extension every game-record file carries once a compression suffix is removed
pub const RECORD_EXTENSION: &str = ".pgn";

/// Compression suffixes the reader knows how to undo
pub const COMPRESSION_SUFFIXES: &[&str] = &[".gz"];

/// Configuration for file discovery behavior
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Descend into subdirectories of the root
    pub recursive: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// True when `file_name`, minus one trailing compression suffix, ends in `.pgn`.
pub fn is_record_file(file_name: &str) -> bool {
    let stripped = COMPRESSION_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .unwrap_or(file_name);
    stripped.len() > RECORD_EXTENSION.len() && stripped.ends_with(RECORD_EXTENSION)
}

/// Enumerates game-record files under `root_dir`.
///
/// Order follows the directory walk and is not stable across platforms; nothing
/// downstream may depend on it. Unreadable subdirectories are logged and skipped.
pub fn discover_files(root_dir: impl AsRef<Path>, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    let root = root_dir.as_ref();
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("Cannot access root directory {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", root.display());
    }

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Directory traversal error (continuing): {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        // suffixes are ASCII, so a lossy name still matches on extension
        let is_record = {
            let file_name = entry.file_name().to_string_lossy();
            if let Cow::Owned(_) = file_name {
                debug!("Non-UTF-8 file name: {}", entry.path().display());
            }
            is_record_file(&file_name)
        };
        if is_record {
            debug!("Found game-record file: {}", entry.path().display());
            files.push(entry.into_path());
        }
    }

    info!("Discovered {} game-record files under {}", files.len(), root.display());
    Ok(files)
}

/// Runs discovery on the blocking pool so the async pipeline is never stalled on
/// directory I/O.
pub async fn collect_discovered_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<PathBuf>> {
    let root = root_dir.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || discover_files(root, &config))
        .await
        .context("File discovery task panicked")?
}
