//! Instruction-to-source mapping for diagnostics.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The front-end node an instruction was lowered from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNode {
    /// Source text of the node, already trimmed by the front-end.
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl SourceNode {
    pub fn new(text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            text: text.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}:{}", self.text, self.line, self.column)
    }
}

/// Sparse map from instruction IP to source node.
///
/// Synthesized instructions have no entry; lookups for them return `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    entries: BTreeMap<u32, SourceNode>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ip: u32, node: SourceNode) {
        self.entries.insert(ip, node);
    }

    pub fn get(&self, ip: u32) -> Option<&SourceNode> {
        self.entries.get(&ip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in IP order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &SourceNode)> {
        self.entries.iter().map(|(ip, node)| (*ip, node))
    }
}
