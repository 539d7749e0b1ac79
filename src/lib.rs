//! # Repository Analyzer
//!
//! Clones GitHub repositories, extracts their code structure, indexes their
//! source text for retrieval, and asks an LLM (OpenAI or a local Ollama
//! server) to summarize them or answer questions about them.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌───────────┐
//! │ repo       │──▶│ extract + chunk  │──▶│  SQLite   │
//! │ clone/scan │   │ + embed (index)  │   │ FTS5+Vec  │
//! └────────────┘   └──────────────────┘   └─────┬─────┘
//!                                               │ retrieve
//!                                               ▼
//!                  ┌──────────┐          ┌────────────┐
//!                  │ CLI/HTTP │◀─────────│ prompt+llm │
//!                  └──────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`repo`] | URL validation, clone cache, source scan |
//! | [`extract`] | Per-language structure extraction |
//! | [`chunk`] | Character-window chunking |
//! | [`embedding`] | Embedding providers and vector helpers |
//! | [`store`] | SQLite persistence and search |
//! | [`index`] | Repository preparation and retrieval |
//! | [`prompt`] | Prompts and LLM-free fallbacks |
//! | [`llm`] | Chat-completion clients |
//! | [`analyze`] | Analyze / ask / explain operations |
//! | [`server`] | HTTP API |

pub mod analyze;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod http;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod repo;
pub mod server;
pub mod store;
