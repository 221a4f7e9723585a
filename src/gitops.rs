//! Optional git commit of the refreshed catalog
//!
//! Never fatal: a run that priced everything but could not commit is
//! still a successful run.

use std::path::Path;
use std::process::{Command, Output};

/// Stage and commit one file when `git status` reports it changed.
pub fn commit_if_changed(repo_dir: &Path, file: &Path, message: &str) {
    let file_arg = file.to_string_lossy().to_string();

    let status = match git(repo_dir, &["status", "--porcelain", "--", &file_arg]) {
        Some(out) if out.status.success() => out,
        _ => {
            log::warn!("git status failed; skipping commit");
            return;
        }
    };
    if status.stdout.is_empty() {
        log::info!("Catalog unchanged; nothing to commit");
        return;
    }

    match git(repo_dir, &["add", "--", &file_arg]) {
        Some(out) if out.status.success() => {}
        _ => {
            log::warn!("git add failed; skipping commit");
            return;
        }
    }

    match git(repo_dir, &["commit", "-m", message]) {
        Some(out) if out.status.success() => {
            log::info!("Committed catalog changes: {}", message);
        }
        Some(out) => {
            log::warn!(
                "git commit failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        None => log::warn!("git commit could not run"),
    }
}

fn git(repo_dir: &Path, args: &[&str]) -> Option<Output> {
    match Command::new("git").current_dir(repo_dir).args(args).output() {
        Ok(out) => Some(out),
        Err(e) => {
            log::warn!("git {:?} did not run: {}", args.first().unwrap_or(&""), e);
            None
        }
    }
}
