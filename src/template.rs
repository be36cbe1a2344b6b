//! Template decoding: `{{kind|pos1|pos2|key=val}}` into a typed record.

use crate::wikitext::{fragment_inner, split_parts, strip_dedup_marker};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

lazy_static! {
    // key must be word characters, value must be non-empty
    static ref KEYED_ARGUMENT: Regex = Regex::new(r"(?s)^(\w+)=(.+)$").unwrap();
}

/// Kind name of the synthetic fragment prepended to every entry.
pub const START_KIND: &str = "eeStart";

/// Closed set of fragment kinds the extractor understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Start,
    Inherited,
    Derived,
    Borrowed,
    LearnedBorrowing,
    Link,
    Mention,
    Compound,
    Affix,
    Confix,
    Suffix,
    Prefix,
    /// `he-m`, `he-l`
    Hebrew,
    /// `ar-root`
    ArabicRoot,
    /// `zh-l`, `zh-m`
    Chinese,
    /// `ja-r`
    JapaneseReading,
    Cognate,
    Doublet,
    /// `w`, a Wikipedia link
    Wikipedia,
    Other(String),
}

impl TemplateKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            START_KIND => TemplateKind::Start,
            "inh" | "inherited" => TemplateKind::Inherited,
            "der" | "derived" => TemplateKind::Derived,
            "bor" | "borrowed" => TemplateKind::Borrowed,
            "lbor" | "learned borrowing" => TemplateKind::LearnedBorrowing,
            "l" | "link" => TemplateKind::Link,
            "m" | "mention" => TemplateKind::Mention,
            "com" | "compound" => TemplateKind::Compound,
            "af" | "affix" => TemplateKind::Affix,
            "confix" => TemplateKind::Confix,
            "suf" | "suffix" => TemplateKind::Suffix,
            "pre" | "prefix" => TemplateKind::Prefix,
            "he-m" | "he-l" => TemplateKind::Hebrew,
            "ar-root" => TemplateKind::ArabicRoot,
            "zh-l" | "zh-m" => TemplateKind::Chinese,
            "ja-r" => TemplateKind::JapaneseReading,
            "cog" | "cognate" => TemplateKind::Cognate,
            "doublet" => TemplateKind::Doublet,
            "w" => TemplateKind::Wikipedia,
            other => TemplateKind::Other(other.to_string()),
        }
    }

    /// Kinds that state a lineage step from one word to another.
    pub fn is_direct_connection(&self) -> bool {
        matches!(
            self,
            TemplateKind::Inherited
                | TemplateKind::Derived
                | TemplateKind::Borrowed
                | TemplateKind::LearnedBorrowing
                | TemplateKind::Link
                | TemplateKind::Mention
                | TemplateKind::Compound
                | TemplateKind::Affix
                | TemplateKind::Confix
                | TemplateKind::Suffix
                | TemplateKind::Prefix
                | TemplateKind::Hebrew
                | TemplateKind::ArabicRoot
                | TemplateKind::Chinese
                | TemplateKind::JapaneseReading
        )
    }

    /// Comparisons rather than lineage.
    pub fn is_cognate(&self) -> bool {
        matches!(self, TemplateKind::Cognate | TemplateKind::Doublet)
    }

    /// Kinds naming several parts, after which the lineage path is unclear.
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            TemplateKind::Compound
                | TemplateKind::Affix
                | TemplateKind::Confix
                | TemplateKind::Suffix
                | TemplateKind::Prefix
        )
    }

    pub fn is_connection_forming(&self) -> bool {
        self.is_direct_connection() || self.is_cognate() || self.is_branch()
    }
}

/// A decoded fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    /// First unkeyed argument, e.g. `inh`.
    pub kind: String,
    /// Remaining unkeyed arguments, with numeric keys spliced in.
    pub positional: Vec<String>,
    pub keyed: BTreeMap<String, String>,
}

impl TemplateInfo {
    pub fn template_kind(&self) -> TemplateKind {
        TemplateKind::from_name(&self.kind)
    }

    /// Positional argument `i`, or `""` when absent.
    pub fn arg(&self, i: usize) -> &str {
        self.positional.get(i).map(String::as_str).unwrap_or("")
    }

    pub fn keyed(&self, name: &str) -> Option<&str> {
        self.keyed.get(name).map(String::as_str)
    }

    /// First non-empty value among the positional indices, then the keyed names.
    pub fn first_non_empty(&self, positions: &[usize], keys: &[&str]) -> Option<&str> {
        positions
            .iter()
            .map(|&i| self.arg(i))
            .chain(keys.iter().filter_map(|k| self.keyed(k)))
            .find(|s| !s.is_empty())
    }
}

/// Decode a fragment, padding the positional list to at least `pad` entries.
///
/// Duplicate-key markers are stripped before splitting. Never fails: missing
/// pieces come back as empty strings.
pub fn decode(fragment: &str, pad: usize) -> TemplateInfo {
    let cleaned = strip_dedup_marker(fragment);
    let all_parts = split_parts(fragment_inner(&cleaned));

    let mut unkeyed = all_parts.iter().filter(|p| !p.contains('=')).cloned();
    let kind = unkeyed.next().unwrap_or_default();
    let mut positional: Vec<String> = unkeyed.collect();
    if positional.len() < pad {
        positional.resize(pad, String::new());
    }

    let mut keyed = BTreeMap::new();
    for part in &all_parts {
        if let Some(cap) = KEYED_ARGUMENT.captures(part) {
            keyed.insert(cap[1].to_string(), cap[2].to_string());
        }
    }

    // 1-based numeric keys go back into the positional list, ascending
    let mut numbered: Vec<(usize, &String)> = keyed
        .iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|n| (n, v)))
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    for (n, value) in numbered {
        let index = match n {
            0 => positional.len().saturating_sub(1),
            n => (n - 1).min(positional.len()),
        };
        positional.insert(index, value.clone());
    }

    TemplateInfo { kind, positional, keyed }
}

/// Kind name of a fragment without decoding the rest.
pub fn kind_name(fragment: &str) -> String {
    let cleaned = strip_dedup_marker(fragment);
    split_parts(fragment_inner(&cleaned))
        .into_iter()
        .next()
        .unwrap_or_default()
}
