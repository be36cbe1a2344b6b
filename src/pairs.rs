//! Edge -> node-pair resolution.

use crate::connections::Edge;
use crate::error::NodeError;
use crate::languages::LanguageTable;
use crate::nodes::{nodes_from_fragment, Language, Node, Role};
use crate::segment::EntryId;
use crate::template::{kind_name, TemplateKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A word with its language resolved to a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordNode {
    pub word: String,
    pub language_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConnection {
    pub descendant: WordNode,
    pub root: WordNode,
    pub entry_id: EntryId,
    pub place: usize,
    pub confidence: f64,
}

/// Resolve both sides of an edge and pair every descendant node with every root node.
///
/// Fails when the root is a comparison, when either side yields no usable
/// node, or when both sides fan out into several nodes.
pub fn node_connections(edge: &Edge, languages: &LanguageTable) -> Result<Vec<NodeConnection>, NodeError> {
    if TemplateKind::from_name(&kind_name(&edge.root)).is_cognate() {
        return Err(NodeError::Cognate { fragment: edge.root.clone() });
    }

    let roots = resolve_all(nodes_from_fragment(&edge.root, Role::Root, false)?, languages)?;
    let descendants = resolve_all(nodes_from_fragment(&edge.descendant, Role::Descendant, false)?, languages)?;

    pair_up(edge, &descendants, &roots)
}

/// Cross product of descendant and root nodes; both sides fanning out is ambiguous.
fn pair_up(edge: &Edge, descendants: &[WordNode], roots: &[WordNode]) -> Result<Vec<NodeConnection>, NodeError> {
    if roots.len() > 1 && descendants.len() > 1 {
        warn!(
            descendant = %edge.descendant,
            root = %edge.root,
            entry_id = %edge.entry_id,
            "several nodes on both sides, dropping pair"
        );
        return Err(NodeError::MultipleAmbiguousRoots {
            roots: roots.len(),
            descendants: descendants.len(),
        });
    }

    let mut connections = Vec::with_capacity(roots.len() * descendants.len());
    for descendant in descendants {
        for root in roots {
            connections.push(NodeConnection {
                descendant: descendant.clone(),
                root: root.clone(),
                entry_id: edge.entry_id.clone(),
                place: edge.place,
                confidence: edge.confidence,
            });
        }
    }
    Ok(connections)
}

fn resolve_all(nodes: Vec<Node>, languages: &LanguageTable) -> Result<Vec<WordNode>, NodeError> {
    nodes.into_iter().map(|n| resolve(n, languages)).collect()
}

fn resolve(node: Node, languages: &LanguageTable) -> Result<WordNode, NodeError> {
    let language_name = match &node.language {
        Language::Name(name) => name.trim().to_string(),
        Language::Code(code) => languages
            .resolve(code)
            .map(str::to_string)
            .ok_or_else(|| NodeError::UnknownLanguage { code: code.trim().to_string() })?,
    };
    Ok(WordNode { word: node.word, language_name })
}
