//! Fragment segmentation: one entry's etymology text -> an arena of fragments.
//!
//! A synthetic `{{eeStart|language|word}}` fragment is prepended, so index 0
//! always stands for the entry itself. Fragments are addressed by index; the
//! `preceding`/`following` lists are index lists the connection scan rewires.

use crate::preprocess::preprocess_etymology;
use crate::template::{kind_name, TemplateKind, START_KIND};
use crate::wikitext::{add_dedup_marker, find_matching_braces, strip_dedup_marker};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

/// Text placed between the start fragment and the etymology.
pub const START_CONNECTOR: &str = " : ";

/// Brace depth a span needs to count as a top-level fragment.
const FRAGMENT_DEPTH: usize = 2;

/// Opaque entry identifier, carried through to every edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

impl Default for EntryId {
    fn default() -> Self {
        EntryId::Number(-1)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{}", n),
            EntryId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntryId {
    fn from(n: i64) -> Self {
        EntryId::Number(n)
    }
}

/// Tag the connection scan assigns to each fragment it visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    Start,
    Cognate,
    Restart,
    Equivalent,
    Branch,
    DirectConnection,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Fragment text as found, with dedup markers when it repeats in the entry.
    pub key: String,
    pub kind: String,
    /// Ordinal position in the entry; the start fragment is 0.
    pub place: usize,
    pub preceding_text: String,
    pub following_text: String,
    pub preceding: Vec<usize>,
    pub following: Vec<usize>,
    pub connection: Option<ConnectionType>,
}

impl Fragment {
    /// The fragment text with dedup markers removed.
    pub fn text(&self) -> Cow<'_, str> {
        strip_dedup_marker(&self.key)
    }

    pub fn template_kind(&self) -> TemplateKind {
        TemplateKind::from_name(&self.kind)
    }

    pub fn is_start(&self) -> bool {
        self.kind == START_KIND
    }
}

/// All fragments of one entry, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmented {
    pub entry_id: EntryId,
    pub fragments: Vec<Fragment>,
}

impl Segmented {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Fragment> {
        self.fragments.get(index)
    }

    /// Index of the first fragment whose key equals `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.fragments.iter().position(|f| f.key == key)
    }

    pub fn has_tag(&self, tag: ConnectionType) -> bool {
        self.fragments.iter().any(|f| f.connection == Some(tag))
    }
}

/// Preprocess an entry's etymology and segment it.
pub fn segment_entry(wikitext: &str, language_name: &str, word: &str, entry_id: EntryId) -> Segmented {
    segment_preprocessed(&preprocess_etymology(wikitext), language_name, word, entry_id)
}

/// Segment text that has already been preprocessed.
pub fn segment_preprocessed(
    etymology: &str,
    language_name: &str,
    word: &str,
    entry_id: EntryId,
) -> Segmented {
    let text = format!(
        "{{{{{}|{}|{}}}}}{}{}",
        START_KIND, language_name, word, START_CONNECTOR, etymology
    );

    let mut fragments: Vec<Fragment> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cur = 0;

    for (place, (start, end)) in find_matching_braces(&text, FRAGMENT_DEPTH).into_iter().enumerate() {
        let mut key = text[start..end].to_string();
        while seen.contains(&key) {
            key = add_dedup_marker(&key);
        }
        seen.insert(key.clone());

        let preceding_text = text[cur..start].to_string();
        let mut fragment = Fragment {
            kind: kind_name(&key),
            key,
            place,
            preceding_text: preceding_text.clone(),
            following_text: String::new(),
            preceding: Vec::new(),
            following: Vec::new(),
            connection: None,
        };

        if let Some(prev) = place.checked_sub(1) {
            fragments[prev].following_text = preceding_text;
            fragments[prev].following = vec![place];
            fragment.preceding = vec![prev];
        }

        fragments.push(fragment);
        cur = end;
    }

    Segmented { entry_id, fragments }
}
