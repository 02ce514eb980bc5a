#![cfg(unix)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Answers a timed search at once and an infinite one on `stop`.
const FAKE_ENGINE: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    uci) printf 'id name fake\nuciok\n' ;;
    isready) printf 'readyok\n' ;;
    "go infinite"*) printf 'info depth 7 multipv 1 score cp 25 pv d2d4 d7d5\n' ;;
    go*) printf 'bestmove g1f3\n' ;;
    stop) printf 'bestmove d2d4\n' ;;
    quit) exit 0 ;;
  esac
done
"#;

fn fake_engine(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fake-engine");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(FAKE_ENGINE.as_bytes()).unwrap();
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn chessbridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chessbridge"))
        .args(args)
        .env_remove("CHESSBRIDGE_ENGINE")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn test_check_accepts_uci_engine() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(&dir);

    let out = chessbridge(&["check", engine.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("UCI engine"));
}

#[test]
fn test_check_rejects_missing_binary() {
    let out = chessbridge(&["check", "/nonexistent/engine"]);
    assert!(!out.status.success());
}

#[test]
fn test_bestmove_prints_engine_move() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(&dir);

    let out = chessbridge(&[
        "bestmove",
        "--engine",
        engine.to_str().unwrap(),
        "--movetime",
        "100",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "bestmove g1f3");
}

#[test]
fn test_bestmove_rejects_bad_fen() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(&dir);

    let out = chessbridge(&[
        "bestmove",
        "--engine",
        engine.to_str().unwrap(),
        "--fen",
        "not a position",
    ]);
    assert!(!out.status.success());
}

#[test]
fn test_analyse_prints_json_updates() {
    let dir = TempDir::new().unwrap();
    let engine = fake_engine(&dir);

    let out = chessbridge(&[
        "analyse",
        "--engine",
        engine.to_str().unwrap(),
        "--seconds",
        "1",
        "--json",
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let first = stdout.lines().next().expect("no analysis output");
    let update: serde_json::Value = serde_json::from_str(first).unwrap();
    assert_eq!(update["snapshot"]["score_cp"], 25);
    assert_eq!(update["snapshot"]["best_move"], "d2d4");
    assert_eq!(update["snapshot"]["depth"], 7);
    assert!(update["display_mate"].is_null());
}
