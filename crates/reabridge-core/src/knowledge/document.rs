//! Immutable knowledge document.
//!
//! The document is an arbitrarily nested tree of mappings, sequences and
//! scalar leaves. Mapping order is preserved from the source JSON so that
//! traversal order (and therefore search tie-breaking) is stable.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Built-in knowledge document, embedded at compile time.
const BUILTIN_DOCUMENT: &str = include_str!("../../data/reaper-knowledge.json");

/// A node of the knowledge tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<Node>),
    /// Entries in document order.
    Mapping(Vec<(String, Node)>),
}

impl Node {
    /// Whether this node holds children.
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Sequence(_) | Node::Mapping(_))
    }

    /// Text form of a scalar leaf. Containers and null have none.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Bool(b) => Some(b.to_string()),
            Node::Number(n) => Some(n.to_string()),
            Node::String(s) => Some(s.clone()),
            Node::Null | Node::Sequence(_) | Node::Mapping(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Child of a mapping by exact key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Child of a sequence by index.
    pub fn index(&self, i: usize) -> Option<&Node> {
        self.as_sequence()?.get(i)
    }

    /// Convert back to a JSON value (mapping order preserved).
    pub fn to_json(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Sequence(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Array(items) => Node::Sequence(items.into_iter().map(Node::from).collect()),
            Value::Object(map) => {
                Node::Mapping(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// One step of a lookup path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Split `a.b[2].c` into key/index segments. `None` on malformed brackets.
fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        } else if rest.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            let index = rest[1..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }
    Some(segments)
}

/// The loaded, read-only knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    root: Node,
}

impl KnowledgeBase {
    /// Wrap an already-built tree.
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// The document shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_DOCUMENT)
    }

    /// Parse a JSON document. The top level must be an object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(Error::Knowledge(
                "top level of the knowledge document must be an object".to_string(),
            ));
        }
        Ok(Self::new(Node::from(value)))
    }

    /// Load a JSON document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let kb = Self::from_json_str(&content)?;
        log::info!("Loaded knowledge document from {}", path.display());
        Ok(kb)
    }

    /// Load from `path` if given, otherwise the built-in document.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Direct retrieval by dotted/indexed path (`actions.transport[3].name`).
    ///
    /// An empty path returns the root.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.root);
        }
        let segments = parse_path(path)?;
        segments
            .into_iter()
            .try_fold(&self.root, |node, segment| match segment {
                Segment::Key(key) => node.get(key),
                Segment::Index(i) => node.index(i),
            })
    }

    /// Keys of the mapping at `path`, for "available" hints.
    pub fn section_keys(&self, path: &str) -> Vec<String> {
        self.lookup(path)
            .and_then(Node::as_mapping)
            .map(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    /// Find actions by numeric id or by name substring.
    ///
    /// A query that parses as an integer and matches an action `id` returns
    /// just that action; otherwise every action whose name contains the query
    /// (case-insensitive) is returned, in document order.
    pub fn find_action(&self, query: &str) -> Vec<&Node> {
        let actions: Vec<&Node> = self
            .root
            .get("actions")
            .and_then(Node::as_mapping)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|(_, group)| group.as_sequence())
                    .flatten()
                    .collect()
            })
            .unwrap_or_default();

        if let Ok(id) = query.trim().parse::<i64>() {
            let by_id = actions.iter().find(|action| {
                matches!(action.get("id"), Some(Node::Number(n)) if n.as_i64() == Some(id))
            });
            if let Some(action) = by_id {
                return vec![*action];
            }
        }

        let needle = query.to_lowercase();
        actions
            .into_iter()
            .filter(|action| {
                action
                    .get("name")
                    .and_then(Node::as_str)
                    .map(|name| name.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// First bundled plugin whose name contains `name` (case-insensitive).
    pub fn find_plugin(&self, name: &str) -> Option<&Node> {
        let needle = name.to_lowercase();
        self.lookup("plugins.reaPlugs.plugins")?
            .as_sequence()?
            .iter()
            .find(|plugin| {
                plugin
                    .get("name")
                    .and_then(Node::as_str)
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
    }

    /// Names of all bundled plugins.
    pub fn plugin_names(&self) -> Vec<String> {
        self.lookup("plugins.reaPlugs.plugins")
            .and_then(Node::as_sequence)
            .map(|plugins| {
                plugins
                    .iter()
                    .filter_map(|p| p.get("name").and_then(Node::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Extension by exact key, else the first key containing `name`.
    pub fn find_extension(&self, name: &str) -> Option<&Node> {
        let needle = name.to_lowercase();
        let extensions = self.root.get("extensions")?;
        extensions.get(&needle).or_else(|| {
            extensions
                .as_mapping()?
                .iter()
                .find(|(key, _)| key.to_lowercase().contains(&needle))
                .map(|(_, node)| node)
        })
    }

    /// Whole troubleshooting section, or the first common issue matching `issue`.
    pub fn troubleshooting(&self, issue: Option<&str>) -> Option<&Node> {
        let section = self.root.get("troubleshooting")?;
        let Some(issue) = issue else {
            return Some(section);
        };
        let needle = issue.to_lowercase();
        section
            .get("commonIssues")?
            .as_sequence()?
            .iter()
            .find(|entry| {
                entry
                    .get("issue")
                    .and_then(Node::as_str)
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
    }

    /// Issue titles listed under `troubleshooting.commonIssues`.
    pub fn troubleshooting_issues(&self) -> Vec<String> {
        self.lookup("troubleshooting.commonIssues")
            .and_then(Node::as_sequence)
            .map(|issues| {
                issues
                    .iter()
                    .filter_map(|i| i.get("issue").and_then(Node::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
