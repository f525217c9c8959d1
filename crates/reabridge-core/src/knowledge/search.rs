//! Free-text search over the knowledge document.
//!
//! Scoring, per emitted result:
//! - a string leaf scores +10 when it contains the whole (lowercased) query and
//!   +2 for every distinct query term (longer than two characters) it contains
//! - a mapping key containing the query or any term emits an additional hit
//!   for its scalar value with a fixed score of 5
//!
//! A leaf whose key and value both match therefore appears twice, once per
//! hit. Results are sorted by score descending with document order breaking
//! ties, and capped at [`MAX_RESULTS`].

use super::document::{KnowledgeBase, Node};
use serde::{Deserialize, Serialize};

/// Maximum number of results returned by a single search.
pub const MAX_RESULTS: usize = 20;

const FULL_MATCH_SCORE: u32 = 10;
const TERM_MATCH_SCORE: u32 = 2;
const KEY_MATCH_SCORE: u32 = 5;

/// Terms this short are treated as noise.
const MIN_TERM_LEN: usize = 3;

/// A single ranked hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Dotted/indexed path of the hit
    pub path: String,
    /// Text of the matching leaf
    pub content: String,
    /// Always greater than zero
    pub score: u32,
}

/// Normalized query: full lowercased phrase plus distinct terms.
#[derive(Debug, Clone)]
struct Query {
    phrase: String,
    terms: Vec<String>,
}

impl Query {
    fn parse(raw: &str) -> Self {
        let phrase = raw.trim().to_lowercase();
        let mut terms: Vec<String> = Vec::new();
        for term in phrase.split_whitespace() {
            if term.chars().count() >= MIN_TERM_LEN && !terms.iter().any(|t| t == term) {
                terms.push(term.to_string());
            }
        }
        Self { phrase, terms }
    }

    fn score_text(&self, text: &str) -> u32 {
        let lower = text.to_lowercase();
        let mut score = 0;
        if lower.contains(&self.phrase) {
            score += FULL_MATCH_SCORE;
        }
        for term in &self.terms {
            if lower.contains(term.as_str()) {
                score += TERM_MATCH_SCORE;
            }
        }
        score
    }

    fn matches_key(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        lower.contains(&self.phrase) || self.terms.iter().any(|t| lower.contains(t.as_str()))
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Hits in traversal order.
#[derive(Default)]
struct Collector {
    results: Vec<SearchResult>,
}

impl Collector {
    fn push(&mut self, path: String, content: String, score: u32) {
        if score > 0 {
            self.results.push(SearchResult { path, content, score });
        }
    }
}

fn walk(node: &Node, path: &str, query: &Query, out: &mut Collector) {
    match node {
        Node::String(text) => {
            out.push(path.to_string(), text.clone(), query.score_text(text));
        }
        Node::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{}[{}]", path, i), query, out);
            }
        }
        Node::Mapping(entries) => {
            for (key, value) in entries {
                let child_path = join_key(path, key);
                if query.matches_key(key) {
                    if let Some(text) = value.scalar_text() {
                        out.push(child_path.clone(), text, KEY_MATCH_SCORE);
                    }
                }
                walk(value, &child_path, query, out);
            }
        }
        Node::Null | Node::Bool(_) | Node::Number(_) => {}
    }
}

/// Rank every matching leaf/key of `kb` against `query`.
///
/// An empty or whitespace-only query yields no results.
pub fn search(kb: &KnowledgeBase, query: &str) -> Vec<SearchResult> {
    let query = Query::parse(query);
    if query.phrase.is_empty() {
        return Vec::new();
    }

    let mut collector = Collector::default();
    walk(kb.root(), "", &query, &mut collector);

    let mut results = collector.results;
    // stable: equal scores keep traversal order
    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(MAX_RESULTS);
    results
}
