//! Stamps the commit and build date shown in `--help` and `--version`.
use chrono::{DateTime, Utc};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=NOCTTY_COMMIT");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-changed=.git/HEAD");

    println!("cargo:rustc-env=NOCTTY_COMMIT={}", commit());
    println!("cargo:rustc-env=NOCTTY_BUILD_DATE={}", build_date());
}

fn commit() -> String {
    if let Ok(commit) = std::env::var("NOCTTY_COMMIT") {
        if !commit.trim().is_empty() {
            return commit.trim().to_string();
        }
    }

    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(unspecified)".to_string())
}

/// Same layout as C's `__DATE__`, e.g. `Oct 16 2026`.
fn build_date() -> String {
    let now = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);
    now.format("%b %e %Y").to_string()
}
