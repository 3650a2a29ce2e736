//! CLI integration tests for coverscan-cli.
//!
//! These tests run the actual binary against catalogs and images prepared in
//! a temporary directory and check outputs and exit codes.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::Utc;
use coverscan_core::{Catalog, CatalogEntry, CatalogStore, HashCodec, SourceRecord};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the coverscan binary.
fn coverscan() -> Command {
    let mut cmd = Command::cargo_bin("coverscan").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("COVERSCAN_CATALOG_PATH")
        .env_remove("COVERSCAN_MATCH_THRESHOLD")
        .env_remove("COVERSCAN_SAMPLE_INTERVAL_MS")
        .env_remove("COVERSCAN_ESCALATION_TIMEOUT_MS");
    cmd
}

fn sleeve_png(invert: bool) -> Vec<u8> {
    let img = ImageBuffer::from_fn(200, 200, |x, y| {
        let checker = if (x / 25 + y / 25) % 2 == 0 { 200u8 } else { 30u8 };
        Rgb([checker, x as u8, y as u8])
    });
    let mut image = DynamicImage::ImageRgb8(img);
    if invert {
        image.invert();
    }
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn record(id: u64, artist: &str, title: &str) -> SourceRecord {
    SourceRecord {
        id,
        master_id: None,
        artist: artist.into(),
        title: title.into(),
        year: Some(1969),
        labels: vec!["Apple".into()],
        formats: vec!["Vinyl".into(), "LP".into()],
        cover_url: Some(format!("https://img.example/{id}.jpg")),
        thumb_url: None,
    }
}

/// Write a catalog whose only fingerprinted entry is the upright sleeve.
fn seed_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("covers-database.json");
    let fingerprint = HashCodec::new().compute_fingerprint(&sleeve_png(false)).unwrap();

    let mut abbey = CatalogEntry::from_record(record(1, "The Beatles", "Abbey Road"), Utc::now());
    abbey.primary_fingerprint = Some(fingerprint);
    let revolver = CatalogEntry::from_record(record(2, "The Beatles", "Revolver"), Utc::now());

    CatalogStore::new(&path)
        .save(&Catalog::new(vec![abbey, revolver], Utc::now()))
        .unwrap();
    path
}

fn frames_dir(dir: &Path, invert: bool, count: usize) -> PathBuf {
    let frames = dir.join("frames");
    fs::create_dir_all(&frames).unwrap();
    for i in 0..count {
        fs::write(frames.join(format!("frame-{i:03}.png")), sleeve_png(invert)).unwrap();
    }
    frames
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    coverscan()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Record sleeve recognition"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("match"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_version_displays_version() {
    coverscan()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("coverscan"));
}

#[test]
fn test_help_shows_exit_codes() {
    coverscan()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_build_help_shows_options() {
    coverscan()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--hash"))
        .stdout(predicate::str::contains("--hash-thumbnails"))
        .stdout(predicate::str::contains("--records"));
}

// ============================================================================
// Catalog Tests
// ============================================================================

#[test]
fn test_stats_on_missing_catalog_is_empty() {
    let temp = TempDir::new().unwrap();
    let catalog = temp.path().join("nothing-here.json");

    coverscan()
        .args(["--catalog", catalog.to_str().unwrap(), "stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 0"));
}

#[test]
fn test_corrupt_catalog_returns_io_error() {
    let temp = TempDir::new().unwrap();
    let catalog = temp.path().join("covers-database.json");
    fs::write(&catalog, b"{ definitely not json").unwrap();

    // Exit code 74 = EX_IOERR
    coverscan()
        .args(["--catalog", catalog.to_str().unwrap(), "stats"])
        .assert()
        .code(74)
        .stderr(predicate::str::contains("Failed to open catalog"));
}

#[test]
fn test_build_from_records_then_search() {
    let temp = TempDir::new().unwrap();
    let catalog = temp.path().join("data/covers-database.json");
    let records = temp.path().join("records.json");
    fs::write(
        &records,
        serde_json::to_vec(&vec![
            record(1, "Beatles", "Abbey Road"),
            record(2, "The Beatles", "Abbey Road (Remastered)"),
            record(3, "Can", "Tago Mago"),
        ])
        .unwrap(),
    )
    .unwrap();

    coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "build",
            "--records",
            records.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Catalog rebuilt"))
        .stdout(predicate::str::contains("Releases: 3"));
    assert!(catalog.exists(), "build should persist the catalog");

    let output = coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "search",
            "--artist",
            "The Beatles",
            "--album",
            "Abbey Road",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let results: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
    let mut ids: Vec<u64> = results.iter().map(|r| r["id"].as_u64().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);

    coverscan()
        .args(["--catalog", catalog.to_str().unwrap(), "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Releases: 3"))
        .stdout(predicate::str::contains("With artwork: 3"))
        .stdout(predicate::str::contains("Fingerprinted: 0"));
}

#[test]
fn test_build_without_discogs_credentials_is_usage_error() {
    let temp = TempDir::new().unwrap();
    let catalog = temp.path().join("covers-database.json");

    // Exit code 64 = EX_USAGE
    coverscan()
        .env_remove("DISCOGS_USER_TOKEN")
        .env_remove("DISCOGS_USERNAME")
        .args(["--catalog", catalog.to_str().unwrap(), "build"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("DISCOGS_USER_TOKEN"));
    assert!(!catalog.exists());
}

#[test]
fn test_search_without_results() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());

    coverscan()
        .args(["--catalog", catalog.to_str().unwrap(), "search", "--artist", "Neu!"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No releases found"));
}

// ============================================================================
// Match Tests
// ============================================================================

#[test]
fn test_match_missing_image_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    coverscan()
        .args(["match", "nonexistent_cover.jpg"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read image"));
}

#[test]
fn test_match_undecodable_image_returns_input_error() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());
    let bogus = temp.path().join("cover.jpg");
    fs::write(&bogus, b"this is not a jpeg").unwrap();

    coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "match",
            bogus.to_str().unwrap(),
        ])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to fingerprint"));
}

#[test]
fn test_match_identifies_sleeve() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());
    let photo = temp.path().join("photo.png");
    fs::write(&photo, sleeve_png(false)).unwrap();

    coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "match",
            photo.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("MATCH (high confidence)"))
        .stdout(predicate::str::contains("The Beatles - Abbey Road (1969) [1]"))
        .stdout(predicate::str::contains("100.0%"));
}

#[test]
fn test_match_unknown_sleeve_returns_no_match() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());
    let photo = temp.path().join("photo.png");
    fs::write(&photo, sleeve_png(true)).unwrap();

    // Exit code 65 = no match
    coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "match",
            photo.to_str().unwrap(),
        ])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("NO MATCH"))
        .stderr(predicate::str::contains("No match found"));
}

#[test]
fn test_match_json_output() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());
    let photo = temp.path().join("photo.png");
    fs::write(&photo, sleeve_png(false)).unwrap();

    let output = coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "match",
            "--json",
            photo.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let verdict: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(verdict["best"]["entry"]["id"], 1);
    assert_eq!(verdict["best"]["distance"], 0);
    assert_eq!(verdict["confidence"], "high");
    assert_eq!(verdict["searched"], 1);
}

// ============================================================================
// Watch Tests
// ============================================================================

#[test]
fn test_watch_confirms_matching_frames() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());
    let frames = frames_dir(temp.path(), false, 4);

    coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "watch",
            "--interval-ms",
            "50",
            "--timeout-ms",
            "5000",
            frames.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("IDENTIFIED"))
        .stdout(predicate::str::contains("The Beatles - Abbey Road"));
}

#[test]
fn test_watch_escalates_when_nothing_matches() {
    let temp = TempDir::new().unwrap();
    let catalog = seed_catalog(temp.path());
    let frames = frames_dir(temp.path(), true, 3);

    coverscan()
        .args([
            "--catalog",
            catalog.to_str().unwrap(),
            "watch",
            "--interval-ms",
            "50",
            "--timeout-ms",
            "400",
            frames.to_str().unwrap(),
        ])
        .assert()
        .code(65)
        .stdout(predicate::str::contains("NOT IDENTIFIED"))
        .stderr(predicate::str::contains("no secondary recognizer configured"));
}

#[test]
fn test_watch_missing_directory_returns_input_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("no-frames");

    coverscan()
        .args(["watch", missing.to_str().unwrap()])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read frames directory"));
}
