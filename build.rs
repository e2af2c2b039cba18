//! Build script to inject version and git SHA at compile time.
//!
//! Environment variables (set by CI or fall back to defaults):
//! - MPD_CONTROL_VERSION: release version (defaults to CARGO_PKG_VERSION)
//! - MPD_CONTROL_GIT_SHA: commit SHA (defaults to GITHUB_SHA or git rev-parse)

use std::process::Command;

fn main() {
    let version = std::env::var("MPD_CONTROL_VERSION").unwrap_or_else(|_| {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".into())
    });
    println!("cargo:rustc-env=MPD_CONTROL_VERSION={}", version);

    let git_sha = std::env::var("MPD_CONTROL_GIT_SHA")
        .or_else(|_| {
            std::env::var("GITHUB_SHA").map(|sha| sha.chars().take(7).collect::<String>())
        })
        .unwrap_or_else(|_| git_short_sha());
    println!("cargo:rustc-env=MPD_CONTROL_GIT_SHA={}", git_sha);

    println!("cargo:rerun-if-env-changed=MPD_CONTROL_VERSION");
    println!("cargo:rerun-if-env-changed=MPD_CONTROL_GIT_SHA");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
}

fn git_short_sha() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|sha| sha.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}
