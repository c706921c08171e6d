use serde_json::Value;
use std::fs;
use std::process::Command;

#[path = "integration/mod.rs"]
mod test_utils;
use test_utils::{games, TestFixture};

fn fenwdl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fenwdl"))
}

/// CSV report, console summary and --stats-out JSON from one run
#[test]
fn test_cli_writes_report_and_stats() {
    let fixture = TestFixture::new();
    fixture.create_pgn_file(
        "pgns/t1-0.pgn",
        &games(&[("1-0", "P1"), ("1-0", "P1"), ("1/2-1/2", "P1"), ("0-1", "P2")]),
    );
    let output_path = fixture.path("results.csv");
    let stats_path = fixture.path("run_stats.json");

    let output = fenwdl()
        .arg("--dir")
        .arg(fixture.path("pgns"))
        .arg("--output")
        .arg(&output_path)
        .arg("--stats-out")
        .arg(&stats_path)
        .arg("--concurrency")
        .arg("2")
        .arg("--no-progress")
        .output()
        .expect("Failed to run fenwdl");

    assert!(output.status.success(), "fenwdl failed: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Analyzed 4 games in total (W/D/L = 2/1/1)"), "stdout: {stdout}");
    assert!(stdout.contains("Time taken: "));
    assert!(stdout.contains("Wrote results to "));

    let csv = fs::read_to_string(&output_path).expect("Failed to read report");
    assert_eq!(csv, "FEN, Wins, Draws, Losses\nP1, 2, 1, 0\nP2, 0, 0, 1\n");

    let stats: Value = serde_json::from_str(&fs::read_to_string(&stats_path).expect("Failed to read stats file"))
        .expect("Failed to parse JSON");
    let obj = stats.as_object().expect("Stats should be a JSON object");
    for key in [
        "run_start",
        "total_processing_time_ms",
        "files_discovered",
        "files_selected",
        "files_analyzed",
        "files_failed",
        "chunks",
        "games_seen",
        "games_aggregated",
        "positions",
        "wins",
        "draws",
        "losses",
        "file_stats",
    ] {
        assert!(obj.contains_key(key), "Missing {key} field");
    }
    assert_eq!(obj["games_aggregated"].as_u64(), Some(4));
    assert_eq!(obj["positions"].as_u64(), Some(2));
    assert_eq!(obj["files_failed"].as_u64(), Some(0));

    let file_stats = obj["file_stats"].as_array().expect("file_stats should be an array");
    assert_eq!(file_stats.len(), 1);
    let file_obj = file_stats[0].as_object().expect("File stat should be an object");
    for key in ["path", "games_seen", "games_aggregated", "processing_time_ms", "status", "error"] {
        assert!(file_obj.contains_key(key), "Missing {key} field");
    }
    assert_eq!(file_obj["status"].as_str(), Some("success"));
    assert!(file_obj["error"].is_null());
}

/// Fatal configuration errors exit non-zero before any report is written
#[test]
fn test_cli_duplicate_tests_exit_nonzero() {
    let fixture = TestFixture::new();
    fixture.create_pgn_file("pgns/a/t1-0.pgn", &games(&[("1-0", "P1")]));
    fixture.create_pgn_file("pgns/b/t1-0.pgn", &games(&[("1-0", "P1")]));
    let output_path = fixture.path("results.csv");

    let output = fenwdl()
        .arg("--dir")
        .arg(fixture.path("pgns"))
        .arg("--output")
        .arg(&output_path)
        .arg("--no-progress")
        .output()
        .expect("Failed to run fenwdl");

    assert!(!output.status.success());
    assert!(!output_path.exists());

    let with_flag = fenwdl()
        .arg("--dir")
        .arg(fixture.path("pgns"))
        .arg("--output")
        .arg(&output_path)
        .arg("--allow-duplicates")
        .arg("--no-progress")
        .output()
        .expect("Failed to run fenwdl");
    assert!(with_flag.status.success());
    assert!(output_path.exists());
}

/// Empty book patterns and missing directories are rejected
#[test]
fn test_cli_rejects_bad_arguments() {
    let fixture = TestFixture::new();
    fs::create_dir_all(fixture.path("pgns")).expect("Failed to create directory");

    let empty_pattern = fenwdl()
        .arg("--dir")
        .arg(fixture.path("pgns"))
        .arg("--output")
        .arg(fixture.path("results.csv"))
        .arg("--match-book")
        .arg("")
        .output()
        .expect("Failed to run fenwdl");
    assert!(!empty_pattern.status.success());

    let missing_dir = fenwdl()
        .arg("--dir")
        .arg(fixture.path("missing"))
        .arg("--output")
        .arg(fixture.path("results.csv"))
        .output()
        .expect("Failed to run fenwdl");
    assert!(!missing_dir.status.success());
    assert!(!fixture.path("results.csv").exists());
}

/// Draw-rate window narrows both the CSV and the EPD export
#[test]
fn test_cli_draw_rate_window_and_epd() {
    let fixture = TestFixture::new();
    fixture.create_pgn_file(
        "pgns/t1-0.pgn",
        &games(&[
            ("1/2-1/2", "DRAWN"),
            ("1/2-1/2", "DRAWN"),
            ("1-0", "MIXED"),
            ("1/2-1/2", "MIXED"),
            ("1-0", "DECISIVE"),
            ("0-1", "DECISIVE"),
        ]),
    );
    let output_path = fixture.path("filtered.csv");
    let epd_path = fixture.path("filtered.epd");

    let output = fenwdl()
        .arg("--dir")
        .arg(fixture.path("pgns"))
        .arg("--output")
        .arg(&output_path)
        .arg("--epd-out")
        .arg(&epd_path)
        .arg("--draw-rate-min")
        .arg("40")
        .arg("--draw-rate-max")
        .arg("90")
        .arg("--draw-rate-games")
        .arg("0")
        .arg("--no-progress")
        .output()
        .expect("Failed to run fenwdl");

    assert!(output.status.success(), "fenwdl failed: {}", String::from_utf8_lossy(&output.stderr));
    let csv = fs::read_to_string(&output_path).expect("Failed to read report");
    assert_eq!(csv, "FEN, Wins, Draws, Losses\nMIXED, 1, 1, 0\n");
    let epd = fs::read_to_string(&epd_path).expect("Failed to read EPD file");
    assert_eq!(epd, "MIXED\n");

    let out_of_range = fenwdl()
        .arg("--dir")
        .arg(fixture.path("pgns"))
        .arg("--output")
        .arg(fixture.path("other.csv"))
        .arg("--draw-rate-max")
        .arg("101")
        .output()
        .expect("Failed to run fenwdl");
    assert!(!out_of_range.status.success());
}
