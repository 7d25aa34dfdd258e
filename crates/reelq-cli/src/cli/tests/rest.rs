//! Tests for item control, deletion, status and settings.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_start_stop_requeue() {
    match parse(&["reelq", "start", "3"]) {
        CliCommand::Start { id } => assert_eq!(id, 3),
        _ => panic!("expected Start"),
    }
    match parse(&["reelq", "stop", "4"]) {
        CliCommand::Stop { id } => assert_eq!(id, 4),
        _ => panic!("expected Stop"),
    }
    match parse(&["reelq", "requeue", "5"]) {
        CliCommand::Requeue { id } => assert_eq!(id, 5),
        _ => panic!("expected Requeue"),
    }
}

#[test]
fn cli_parse_series_commands() {
    match parse(&["reelq", "requeue-series", "The Show"]) {
        CliCommand::RequeueSeries { title } => assert_eq!(title, "The Show"),
        _ => panic!("expected RequeueSeries"),
    }
    match parse(&["reelq", "delete-series", "The Show"]) {
        CliCommand::DeleteSeries { title } => assert_eq!(title, "The Show"),
        _ => panic!("expected DeleteSeries"),
    }
}

#[test]
fn cli_parse_delete_and_delete_file() {
    match parse(&["reelq", "delete", "9"]) {
        CliCommand::Delete { id } => assert_eq!(id, 9),
        _ => panic!("expected Delete"),
    }
    match parse(&["reelq", "delete-file", "9"]) {
        CliCommand::DeleteFile { id } => assert_eq!(id, 9),
        _ => panic!("expected DeleteFile"),
    }
}

#[test]
fn cli_parse_status() {
    match parse(&["reelq", "status"]) {
        CliCommand::Status { json } => assert!(!json),
        _ => panic!("expected Status"),
    }
    match parse(&["reelq", "status", "--json"]) {
        CliCommand::Status { json } => assert!(json),
        _ => panic!("expected Status with json"),
    }
}

#[test]
fn cli_parse_settings_show() {
    match parse(&["reelq", "settings"]) {
        CliCommand::Settings {
            download_folder,
            filename_template,
            concurrent_downloads,
            speed_limit,
        } => {
            assert!(download_folder.is_none());
            assert!(filename_template.is_none());
            assert!(concurrent_downloads.is_none());
            assert!(speed_limit.is_none());
        }
        _ => panic!("expected Settings"),
    }
}

#[test]
fn cli_parse_settings_update() {
    match parse(&[
        "reelq",
        "settings",
        "--concurrent-downloads",
        "3",
        "--speed-limit",
        "",
        "--filename-template",
        "{title} ({year})",
    ]) {
        CliCommand::Settings {
            concurrent_downloads,
            speed_limit,
            filename_template,
            ..
        } => {
            assert_eq!(concurrent_downloads.as_deref(), Some("3"));
            assert_eq!(speed_limit.as_deref(), Some(""));
            assert_eq!(filename_template.as_deref(), Some("{title} ({year})"));
        }
        _ => panic!("expected Settings"),
    }
}

#[test]
fn cli_rejects_non_numeric_id() {
    assert!(Cli::try_parse_from(["reelq", "stop", "abc"]).is_err());
}
