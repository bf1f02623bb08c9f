//! Stamps the binary with the commit it was built from and the build day,
//! read back by `dcterm --version`.

use std::process::Command;

fn commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}

fn main() {
    let commit = commit().unwrap_or_else(|| "unknown".to_string());
    let day = chrono::Utc::now().format("%Y-%m-%d");

    println!("cargo:rustc-env=DCTERM_GIT_HASH={commit}");
    println!("cargo:rustc-env=DCTERM_BUILD_DATE={day}");
    println!("cargo:rerun-if-changed=build.rs");
}
