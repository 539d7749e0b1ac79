#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use repo_analyzer::config::Config;
use repo_analyzer::repo::repo_id;

pub const REPO_URL: &str = "https://github.com/acme/demo";

pub const APP_PY: &str = r#""""Config helpers."""
import os
from pathlib import Path


def load_config(path):
    """Read the config file."""
    return Path(path).read_text()


class Settings:
    """Holds settings."""

    def __init__(self, values):
        self.values = values

    def get(self, key, default=None):
        return self.values.get(key, default)
"#;

pub const INDEX_JS: &str = r#"import React from 'react';
const api = require('./api');

function render(root) {
  return root;
}
"#;

/// Place a fake checkout where the clone cache expects `url`, so no
/// network access is needed.
pub fn seed_repo(cache_dir: &Path, url: &str) -> PathBuf {
    let dir = cache_dir.join(repo_id(url));
    fs::create_dir_all(dir.join("web")).unwrap();
    fs::create_dir_all(dir.join("node_modules/left-pad")).unwrap();
    fs::write(
        dir.join("README.md"),
        "# Demo Project\n\nA tiny demo that loads configuration files.\n",
    )
    .unwrap();
    fs::write(dir.join("app.py"), APP_PY).unwrap();
    fs::write(dir.join("web/index.js"), INDEX_JS).unwrap();
    fs::write(dir.join("notes.md"), "not source\n").unwrap();
    fs::write(dir.join("node_modules/left-pad/index.js"), "module.exports = 1;\n").unwrap();
    dir
}

/// Defaults with the cache and database under `root`.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.cache.dir = root.join("cache");
    config.cache.db_path = root.join("cache").join("analyzer.sqlite");
    config
}
