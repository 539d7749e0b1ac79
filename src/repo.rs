//! Repository fetch-and-cache.
//!
//! Each repository URL maps to `<cache.dir>/<repo id>`, where the repo id is
//! a short SHA-256 of the URL. A cached directory is reused as-is; otherwise
//! the repository is shallow-cloned into a temporary sibling directory and
//! renamed into place, so a half-finished clone is never visible under the
//! final name.
//!
//! Everything here is blocking (`git` subprocess, directory walks); async
//! callers go through `tokio::task::spawn_blocking`.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::models::SourceFile;

const GITHUB_PREFIX: &str = "https://github.com/";
const README_NAMES: [&str; 4] = ["README.md", "README.MD", "README.txt", "readme.md"];
const README_MAX_CHARS: usize = 10_000;

/// Check that `url` points at a GitHub repository over HTTPS.
pub fn validate_repo_url(url: &str) -> Result<String, AnalyzeError> {
    let url = url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AnalyzeError::InvalidUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    if !url.starts_with(GITHUB_PREFIX) || url.len() == GITHUB_PREFIX.len() {
        return Err(AnalyzeError::InvalidUrl(
            "URL must be a GitHub repository URL".to_string(),
        ));
    }
    Ok(url.to_string())
}

/// First 16 hex characters of the URL's SHA-256.
pub fn repo_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

pub fn repo_dir(config: &Config, url: &str) -> PathBuf {
    config.cache.dir.join(repo_id(url))
}

/// Return the cached checkout for `url`, cloning it first if needed.
pub fn ensure_cloned(config: &Config, url: &str) -> Result<PathBuf> {
    let dest = repo_dir(config, url);
    if dest.is_dir() {
        tracing::debug!(url, path = %dest.display(), "using cached clone");
        return Ok(dest);
    }

    std::fs::create_dir_all(&config.cache.dir).with_context(|| {
        format!(
            "Failed to create cache directory: {}",
            config.cache.dir.display()
        )
    })?;

    let tmp = config
        .cache
        .dir
        .join(format!(".clone-{}", Uuid::new_v4().simple()));

    tracing::info!(url, "cloning repository");
    if let Err(e) = git_clone(url, &tmp) {
        let _ = std::fs::remove_dir_all(&tmp);
        return Err(e.into());
    }

    if let Err(e) = std::fs::rename(&tmp, &dest) {
        let _ = std::fs::remove_dir_all(&tmp);
        // Another request finished the same clone first.
        if dest.is_dir() {
            return Ok(dest);
        }
        return Err(e).with_context(|| format!("Failed to move clone into {}", dest.display()));
    }

    tracing::info!(url, path = %dest.display(), "clone complete");
    Ok(dest)
}

fn git_clone(url: &str, dest: &Path) -> Result<(), AnalyzeError> {
    let output = Command::new("git")
        .args(["clone", "--depth=1", "--quiet"])
        .arg(url)
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| AnalyzeError::CloneFailed(format!("could not run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(url, stderr = %stderr.trim(), "git clone failed");
        return Err(AnalyzeError::CloneFailed(
            "check the URL or your network".to_string(),
        ));
    }

    Ok(())
}

/// Read the first README found at the repository root, capped at 10k chars.
pub fn load_readme(repo_path: &Path) -> String {
    for name in README_NAMES {
        let path = repo_path.join(name);
        if path.is_file() {
            return match std::fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes)
                    .chars()
                    .take(README_MAX_CHARS)
                    .collect(),
                Err(_) => String::new(),
            };
        }
    }
    String::new()
}

/// Sorted names of top-level entries, hidden ones excluded.
pub fn top_level_listing(repo_path: &Path, limit: usize) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(repo_path) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| !name.starts_with('.'))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names.truncate(limit);
    names
}

/// Walk the checkout and read every source file the scan config accepts.
pub fn scan_source_files(config: &Config, repo_path: &Path) -> Result<Vec<SourceFile>> {
    let exclude_set = build_globset(&config.scan.exclude_globs)?;
    let extensions: Vec<String> = config
        .scan
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();

    for entry in WalkDir::new(repo_path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(repo_path).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let extension = match path.extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => continue,
        };
        if !extensions.contains(&extension) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.scan.max_file_bytes {
            tracing::debug!(path = %rel_str, size, "skipping oversized file");
            continue;
        }

        let text = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => continue,
        };

        files.push(SourceFile {
            path: rel_str,
            extension,
            text,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
