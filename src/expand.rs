//! Offline fragment expansion.
//!
//! Fragments that can never form a connection (glosses, qualifiers, labels)
//! are replaced by their rendered text from an [`ExpansionTable`], so that
//! the connective text around the real lineage fragments reads naturally.
//! Maintenance and headword fragments are deleted outright.

use crate::error::ConfigError;
use crate::template::{kind_name, TemplateKind};
use crate::wikitext::find_matching_braces;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::debug;

const DELETED_KINDS: &[&str] = &["LDL", "wikispecies", "HE root"];

/// Maintenance and cleanup request fragments.
pub const REQUEST_KINDS: &[&str] = &[
    "MW1913Abbr",
    "Nuttall",
    "USRegionDisputed",
    "Webster 1913",
    "ase-rfr",
    "attention",
    "beer",
    "broken ref",
    "checksense",
    "copyvio suspected",
    "delete",
    "etystub",
    "look",
    "merge",
    "missing template",
    "move",
    "split",
    "stub entry",
    "t-needed",
    "tbot entry",
    "tea room",
    "tea room sense",
    "ttbc",
    "defaults to und",
    "unblock",
];

lazy_static! {
    // en-noun, la-verb, grc-decl ... headword and inflection tables
    static ref HEADWORD_KIND: Regex = Regex::new(
        r"^\w{2,3}-(?:verb|noun|adj|adv|decl|conj|proper|infl|adecl|pos|latin|gal)(?:$| .*|-.*|/.*)"
    ).unwrap();
    static ref REQUEST_KIND: Regex = Regex::new(r"^rf[0-9a-z- ]+").unwrap();
}

/// Rendered text for fragments, keyed by exact fragment text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ExpansionTable {
    replacements: HashMap<String, String>,
}

impl ExpansionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            line: source.line(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_json_str(&contents, path)?;
        debug!(path = %path.display(), fragments = table.len(), "loaded expansion table");
        Ok(table)
    }

    pub fn get(&self, fragment: &str) -> Option<&str> {
        self.replacements.get(fragment).map(String::as_str)
    }

    pub fn insert(&mut self, fragment: impl Into<String>, text: impl Into<String>) {
        self.replacements.insert(fragment.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// Whether a fragment's kind can take part in a connection.
pub fn is_connection_forming(fragment: &str) -> bool {
    TemplateKind::from_name(&kind_name(fragment)).is_connection_forming()
}

/// Whether a fragment should simply be removed.
pub fn should_delete(fragment: &str) -> bool {
    let kind = kind_name(fragment);
    DELETED_KINDS.contains(&kind.as_str())
        || HEADWORD_KIND.is_match(&kind)
        || REQUEST_KINDS.contains(&kind.as_str())
        || REQUEST_KIND.is_match(&kind)
}

/// Replace, delete or keep each top-level fragment of `text`.
pub fn expand_fragments(text: &str, table: &ExpansionTable, keep_connection_forming: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cur = 0;

    for (start, end) in find_matching_braces(text, 0) {
        out.push_str(&text[cur..start]);
        let fragment = &text[start..end];
        if keep_connection_forming && is_connection_forming(fragment) {
            out.push_str(fragment);
        } else if !should_delete(fragment) {
            out.push_str(table.get(fragment).unwrap_or(""));
        }
        cur = end;
    }
    out.push_str(&text[cur..]);

    out.replace("()", "").trim().replace("\n* ", "\n ")
}

/// Fragments of `texts` that would need rendering but have no table entry.
pub fn missing<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    table: &ExpansionTable,
    keep_connection_forming: bool,
) -> BTreeSet<String> {
    texts
        .into_iter()
        .flat_map(|text| {
            find_matching_braces(text, 0)
                .into_iter()
                .map(move |(s, e)| &text[s..e])
        })
        .filter(|f| !(keep_connection_forming && is_connection_forming(f)))
        .filter(|f| !should_delete(f))
        .filter(|f| table.get(f).is_none())
        .map(str::to_string)
        .collect()
}
