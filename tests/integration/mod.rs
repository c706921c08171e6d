// Integration test utilities and common code
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// First four FEN fields of the position after 1. e4
pub const E4_PREFIX: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -";

/// Temporary PGN archive laid out like a test-batch download
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();
        Self { temp_dir, root_path }
    }

    fn prepare(&self, relative_path: &Path) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        file_path
    }

    /// Plain PGN file with the given content
    pub fn create_pgn_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.prepare(relative_path.as_ref());
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// Gzip-compressed file; the relative path should end in `.gz`
    pub fn create_gz_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.prepare(relative_path.as_ref());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).expect("Failed to compress test file");
        fs::write(&file_path, encoder.finish().expect("Failed to finish gzip stream"))
            .expect("Failed to write test file");
        file_path
    }

    /// Sidecar `<stem>.json` wrapping `args`
    pub fn create_metadata<P: AsRef<Path>>(&self, relative_stem: P, args: serde_json::Value) -> PathBuf {
        let mut relative = relative_stem.as_ref().as_os_str().to_owned();
        relative.push(".json");
        let file_path = self.prepare(Path::new(&relative));
        let document = serde_json::json!({ "args": args });
        fs::write(&file_path, document.to_string()).expect("Failed to write metadata file");
        file_path
    }

    pub fn path<P: AsRef<Path>>(&self, relative_path: P) -> PathBuf {
        self.root_path.join(relative_path)
    }
}

/// One game record with `Result` and `FEN` headers and a short move text
pub fn game(result: &str, fen: &str) -> String {
    format!("[Event \"test\"]\n[Result \"{result}\"]\n[FEN \"{fen}\"]\n\n1. e4 e5 {{book}} 2. Nf3 {result}\n\n")
}

/// Game record carrying a `Termination` header
pub fn terminated_game(result: &str, fen: &str, termination: &str) -> String {
    format!("[Result \"{result}\"]\n[FEN \"{fen}\"]\n[Termination \"{termination}\"]\n\n1. e4 {result}\n\n")
}

/// Concatenates game records into one PGN body
pub fn games(records: &[(&str, &str)]) -> String {
    records.iter().map(|(result, fen)| game(result, fen)).collect()
}
