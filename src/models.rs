//! Core data models.
//!
//! These types flow from the repository scan through extraction, chunking,
//! and retrieval, and most of them are serialized straight into API
//! responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A source file read from a cloned repository.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// Lower-cased extension without the dot.
    pub extension: String,
    pub text: String,
}

/// A function or method found by the structure extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// 1-based line of the definition.
    pub line: usize,
    pub args: Vec<String>,
    #[serde(default)]
    pub docstring: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub line: usize,
    pub methods: Vec<FunctionInfo>,
    #[serde(default)]
    pub docstring: String,
}

/// Structure of one source file.
///
/// `functions` lists every function definition in the file, methods
/// included; `classes[].methods` repeats the methods under their owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStructure {
    pub language: String,
    pub lines: usize,
    pub size: usize,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
}

/// Per-file structures keyed by relative path. Ordered so prompt excerpts
/// and API responses are deterministic.
pub type RepoStructure = BTreeMap<String, FileStructure>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoStats {
    pub total_files: usize,
    pub python_files: usize,
    pub js_files: usize,
    pub total_functions: usize,
    pub total_classes: usize,
}

/// A fixed-size window of a source file's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub repo_id: String,
    pub chunk_index: i64,
    pub path: String,
    pub extension: String,
    /// Character offsets into the file, end exclusive.
    pub start_char: i64,
    pub end_char: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned by retrieval, with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub path: String,
    pub extension: String,
    pub start_char: i64,
    pub end_char: i64,
    pub score: f64,
    #[serde(skip)]
    pub text: String,
}

/// A repository that has been cloned and indexed.
#[derive(Debug, Clone)]
pub struct PreparedRepo {
    pub repo_id: String,
    pub url: String,
    pub path: PathBuf,
    pub readme: String,
    pub structure: RepoStructure,
}
