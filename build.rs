//! Build script for mergebot - embeds a human-readable version string.
//!
//! The string is `CARGO_PKG_VERSION (git) rustc`, where the git part is the
//! output of `git describe --tags --always --dirty` when tags exist, or
//! `v{version}-{commit timestamp}-{short sha}` otherwise. Builds outside a
//! git checkout fall back to the build timestamp.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

fn main() {
    ["src", "build.rs", "Cargo.toml"]
        .iter()
        .for_each(|path| println!("cargo:rerun-if-changed={path}"));

    let version = [
        Some(env!("CARGO_PKG_VERSION").to_string()),
        git_version().map(|v| format!("({v})")),
        run("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    println!("cargo:rustc-env=MERGEBOT_BUILD_INFO={version}");
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn git_version() -> Option<String> {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        // A bare hash means there are no tags to describe against.
        Some(desc) if desc.contains('v') || desc.contains("-g") => Some(desc),
        _ => Some(pseudo_version()),
    }
}

fn pseudo_version() -> String {
    let commit = run("git", &["rev-parse", "--short=12", "HEAD"]);
    let committed_at = run("git", &["log", "-1", "--format=%ct"])
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let timestamp = committed_at
        .unwrap_or_else(Utc::now)
        .format("%Y%m%d%H%M%S");
    let version = env!("CARGO_PKG_VERSION");

    match commit {
        Some(commit) => format!("v{version}-{timestamp}-{commit}"),
        None => format!("v{version}-{timestamp}"),
    }
}
