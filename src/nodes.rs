//! Node extraction: one decoded fragment -> `{word, language}` nodes.
//!
//! Every kind has a fixed field layout. Branch kinds (compound, affix, confix)
//! fan out into one node per part when read as a root, and are rejected when
//! read as a descendant, since a descendant must be a single word.

use crate::error::NodeError;
use crate::template::{decode, TemplateInfo, TemplateKind};
use serde::Serialize;

/// Minimum positional length used when decoding for node extraction.
const NODE_PAD: usize = 4;

/// Keyed fallbacks for the word, in priority order.
const WORD_FALLBACK_KEYS: [&str; 3] = ["alt", "sort", "tr"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// A code such as `enm`, resolved through the language table.
    Code(String),
    /// A literal name such as `Hebrew`, used as-is.
    Name(String),
}

impl Language {
    pub fn as_str(&self) -> &str {
        match self {
            Language::Code(s) | Language::Name(s) => s,
        }
    }

    /// Comparison key: the code or name without surrounding whitespace.
    pub fn key(&self) -> &str {
        self.as_str().trim()
    }

    fn is_blank(&self) -> bool {
        self.key().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub word: String,
    pub language: Language,
}

impl Node {
    fn coded(word: &str, code: &str) -> Self {
        Node { word: word.to_string(), language: Language::Code(code.to_string()) }
    }

    fn named(word: &str, name: &str) -> Self {
        Node { word: word.to_string(), language: Language::Name(name.to_string()) }
    }
}

/// Which side of a connection a fragment is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Root,
    Descendant,
}

/// Extract nodes from a fragment.
///
/// `allow_non_connections` lets cognate kinds produce a node instead of
/// failing with [`NodeError::Cognate`].
pub fn nodes_from_fragment(
    fragment: &str,
    role: Role,
    allow_non_connections: bool,
) -> Result<Vec<Node>, NodeError> {
    let info = decode(fragment, NODE_PAD);
    let nodes = dispatch(&info, fragment, role, allow_non_connections)?;

    let invalid = nodes
        .iter()
        .any(|n| n.word.is_empty() || n.word == "-" || n.language.is_blank());
    if invalid {
        return Err(NodeError::EmptyWordOrLanguage { fragment: fragment.to_string() });
    }
    if nodes.is_empty() {
        return Err(NodeError::NoNodes { fragment: fragment.to_string() });
    }
    Ok(nodes)
}

fn dispatch(
    info: &TemplateInfo,
    fragment: &str,
    role: Role,
    allow_non_connections: bool,
) -> Result<Vec<Node>, NodeError> {
    let missing_word = || NodeError::MissingWord { fragment: fragment.to_string() };

    let nodes = match info.template_kind() {
        // [language_name, word]
        TemplateKind::Start => vec![Node::named(info.arg(1), info.arg(0))],

        TemplateKind::Wikipedia => {
            let word = info
                .positional
                .iter()
                .rev()
                .find(|p| !p.is_empty())
                .ok_or_else(missing_word)?;
            vec![Node::named(word, "English")]
        }

        // [target_code, source_code, word, alt]
        TemplateKind::Inherited
        | TemplateKind::Derived
        | TemplateKind::Borrowed
        | TemplateKind::LearnedBorrowing => {
            let word = info
                .first_non_empty(&[2, 3], &WORD_FALLBACK_KEYS)
                .ok_or_else(missing_word)?;
            vec![Node::coded(word, info.arg(1))]
        }

        // [code, word, alt]
        TemplateKind::Link | TemplateKind::Mention => {
            let word = info
                .first_non_empty(&[1, 2], &WORD_FALLBACK_KEYS)
                .ok_or_else(missing_word)?;
            vec![Node::coded(word, info.arg(0))]
        }

        // [code, part1, part2, ...] with per-part langN overrides
        TemplateKind::Compound | TemplateKind::Affix | TemplateKind::Confix => match role {
            Role::Root => info
                .positional
                .iter()
                .skip(1)
                .enumerate()
                .filter(|(_, part)| !part.is_empty())
                .map(|(i, part)| Node::coded(part, part_language(info, i + 1)))
                .collect(),
            Role::Descendant => {
                return Err(NodeError::AmbiguousShape { fragment: fragment.to_string() })
            }
        },

        // [code, stem, suffix]
        TemplateKind::Suffix => {
            let mut nodes = vec![Node::coded(info.arg(1), part_language(info, 1))];
            if role == Role::Root && !info.arg(2).is_empty() {
                nodes.push(Node::coded(info.arg(2), part_language(info, 2)));
            }
            nodes
        }

        // [code, prefix, stem]
        TemplateKind::Prefix => {
            let mut nodes = Vec::new();
            if role == Role::Root {
                nodes.push(Node::coded(info.arg(1), part_language(info, 1)));
            }
            if !info.arg(2).is_empty() {
                nodes.push(Node::coded(info.arg(2), part_language(info, 2)));
            }
            nodes
        }

        TemplateKind::Hebrew => vec![Node::named(info.arg(0), "Hebrew")],
        TemplateKind::ArabicRoot => vec![Node::named(info.arg(0), "Arabic")],
        TemplateKind::Chinese => vec![Node::named(info.arg(0), "Chinese")],
        TemplateKind::JapaneseReading => vec![Node::named(info.arg(0), "Japanese")],

        TemplateKind::Cognate | TemplateKind::Doublet => {
            if !allow_non_connections {
                return Err(NodeError::Cognate { fragment: fragment.to_string() });
            }
            let word = info.first_non_empty(&[1, 2], &[]).unwrap_or("");
            vec![Node::coded(word, info.arg(0))]
        }

        TemplateKind::Other(kind) => return Err(NodeError::UnsupportedKind { kind }),
    };

    Ok(nodes)
}

/// Language code of part `n` (1-based): `langN=` when given, else the template language.
fn part_language(info: &TemplateInfo, n: usize) -> &str {
    info.keyed(&format!("lang{}", n)).unwrap_or_else(|| info.arg(0))
}
