//! # evalscope-core
//!
//! Core library for evalscope - conversation analytics and batched report
//! synthesis for recorded voice-agent calls.
//!
//! This library provides:
//! - Domain types for conversations, turns and tool invocations
//! - An in-memory transcript store with JSON/glob ingestion
//! - Filter, search and sort over the store
//! - Per-dimension aggregation, KPIs and daily trends
//! - The analyst workbench (pinning, live sampling, analysis chat)
//! - The map/reduce/render report pipeline and its HTTP backend
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows strictly downward:
//! - **Store:** immutable-per-load conversations, newest first
//! - **Views:** filter/sort and aggregation, pure functions over the store
//! - **Consumers:** workbench and report pipeline, the only async code
//!
//! ## Example
//!
//! ```rust,no_run
//! use evalscope_core::analytics::Overview;
//! use evalscope_core::{Config, TranscriptStore};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = TranscriptStore::load_globs(&["exports/*.json"]).expect("failed to load");
//!
//! let range = store.default_date_range();
//! let overview = Overview::compute(&store.within(range.as_ref()), &config.agents);
//! println!("{} conversations", overview.kpis.total);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{DateRange, FilterState, FilterType, SortConfig, SortDirection, SortKey};
pub use store::TranscriptStore;
pub use types::*;
pub use workbench::{PinnedItem, Workbench};

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod logging;
pub mod report;
pub mod store;
pub mod types;
pub mod workbench;
