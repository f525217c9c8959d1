//! Knowledge base: document store and free-text search.
//!
//! - [`KnowledgeBase`] - the immutable nested document, loaded once
//! - [`search()`] - stateless ranking of leaves and keys against a query
//! - [`SearchEngine`] - search plus lookup with a bounded result cache

mod document;
mod engine;
mod search;

pub use document::{KnowledgeBase, Node};
pub use engine::SearchEngine;
pub use search::{search, SearchResult, MAX_RESULTS};
