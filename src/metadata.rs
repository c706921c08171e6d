// WHY: each test batch ships one JSON sidecar next to its PGN files; the test id in the
// file name ties a PGN back to that sidecar

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::AnalysisError;

/// Run configuration of one test batch, as far as filtering needs it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestMetadata {
    pub book: Option<String>,
    pub sprt: Option<bool>,
    pub book_depth: Option<i64>,
}

/// On-disk sidecar layout; everything of interest lives under `args`
#[derive(Debug, Deserialize)]
struct Sidecar {
    #[serde(default)]
    args: Option<SidecarArgs>,
}

#[derive(Debug, Deserialize)]
struct SidecarArgs {
    #[serde(default)]
    book: Option<String>,
    // presence alone marks an SPRT test; the value holds its bounds
    #[serde(default)]
    sprt: Option<Value>,
    #[serde(default, deserialize_with = "string_or_int")]
    book_depth: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrInt {
    Int(i64),
    Text(String),
}

fn string_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<StringOrInt>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrInt::Int(depth)) => Ok(Some(depth)),
        Some(StringOrInt::Text(depth)) => depth
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("book_depth {depth:?} is not an integer: {e}"))),
    }
}

impl TestMetadata {
    /// Decodes a sidecar document. A missing `args` object means no metadata fields.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let sidecar: Sidecar = serde_json::from_str(content)?;
        Ok(sidecar.args.map(Self::from).unwrap_or_default())
    }
}

impl From<SidecarArgs> for TestMetadata {
    fn from(args: SidecarArgs) -> Self {
        Self {
            book: args.book,
            sprt: args.sprt.is_some().then_some(true),
            book_depth: args.book_depth,
        }
    }
}

/// Test id of a PGN file: its name up to the first `-` or `.`.
pub fn test_id(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let end = file_name.find(['-', '.']).unwrap_or(file_name.len());
    file_name[..end].to_string()
}

/// Sidecar stem of a PGN file: its directory joined with its test id.
pub fn metadata_stem(path: &Path) -> PathBuf {
    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    directory.join(test_id(path))
}

/// Sidecar file for a stem: `<stem>.json`.
pub fn sidecar_path(stem: &Path) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(".json");
    PathBuf::from(path)
}

/// A test id that showed up under a second, different stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateTest {
    pub test_id: String,
    /// The stem that collided with the first one recorded for `test_id`
    pub stem: PathBuf,
    pub directory: PathBuf,
}

/// Sidecar metadata for every stem that had one
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    by_stem: HashMap<PathBuf, TestMetadata>,
    duplicates: Vec<DuplicateTest>,
}

impl MetadataIndex {
    /// Metadata of the test batch `path` belongs to, if its sidecar exists.
    pub fn lookup(&self, path: &Path) -> Option<&TestMetadata> {
        self.by_stem.get(&metadata_stem(path))
    }

    pub fn insert(&mut self, stem: PathBuf, metadata: TestMetadata) {
        self.by_stem.insert(stem, metadata);
    }

    /// Conflicts reported while loading, one per offending stem
    pub fn duplicates(&self) -> &[DuplicateTest] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.by_stem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stem.is_empty()
    }
}

/// Reads `<stem>.json`. `Ok(None)` when the sidecar does not exist.
pub fn read_sidecar(stem: &Path) -> Result<Option<TestMetadata>, AnalysisError> {
    let path = sidecar_path(stem);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AnalysisError::Metadata {
                reason: e.to_string(),
                path,
            })
        }
    };

    let metadata = TestMetadata::parse(&content).map_err(|e| AnalysisError::Metadata {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    debug!("Loaded test metadata from {}", path.display());
    Ok(Some(metadata))
}

/// Scans `files` for duplicate test ids and loads each stem's sidecar once.
///
/// A test id seen under a second stem is reported once per offending stem. With
/// `allow_duplicates` the report is a warning and loading continues; otherwise the
/// first conflict is returned as [`AnalysisError::DuplicateTest`].
pub fn load_metadata(files: &[PathBuf], allow_duplicates: bool) -> Result<MetadataIndex, AnalysisError> {
    let mut index = MetadataIndex::default();
    let mut first_stem: HashMap<String, PathBuf> = HashMap::new();
    let mut warned: HashSet<PathBuf> = HashSet::new();
    let mut missing: HashSet<PathBuf> = HashSet::new();

    for path in files {
        let id = test_id(path);
        let stem = metadata_stem(path);

        let known = first_stem.entry(id.clone()).or_insert_with(|| stem.clone());
        if *known != stem && warned.insert(stem.clone()) {
            let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
            if !allow_duplicates {
                error!(
                    "Detected a duplicate of test {} in directory {}; use --allow-duplicates to continue nonetheless",
                    id,
                    directory.display()
                );
                return Err(AnalysisError::DuplicateTest { test_id: id, directory });
            }
            warn!("Detected a duplicate of test {} in directory {}", id, directory.display());
            index.duplicates.push(DuplicateTest {
                test_id: id,
                stem: stem.clone(),
                directory,
            });
        }

        if index.by_stem.contains_key(&stem) || missing.contains(&stem) {
            continue;
        }
        match read_sidecar(&stem)? {
            Some(metadata) => index.insert(stem, metadata),
            None => {
                debug!("No metadata sidecar for {}", stem.display());
                missing.insert(stem);
            }
        }
    }

    info!(
        "Loaded metadata for {} test batches ({} without sidecar, {} duplicates)",
        index.len(),
        missing.len(),
        index.duplicates.len()
    );
    Ok(index)
}
