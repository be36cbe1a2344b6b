//! The connection scan: walks a segmented entry left to right and turns the
//! connective text between fragments into `(descendant, root)` edges.
//!
//! Each fragment after the start is handled by the first rule that applies:
//!
//! | rule        | trigger                               | effect                                    |
//! |-------------|---------------------------------------|-------------------------------------------|
//! | cognate     | cognate kind or cognate text          | stop                                      |
//! | restart     | sentence break                        | link to the start once, else stop         |
//! | equivalent  | `", "`                                | same language: share predecessors         |
//! | branch      | `" + "`, `" and "`, ...               | share predecessors, first branch links    |
//! | from        | `" : From "`, `", borrowed from "`... | link from predecessors unless after branch |
//! | compound    | `" "`                                 | drop the last edge, stop                  |
//!
//! Anything else stops the scan as unrecognized.

use crate::classify;
use crate::nodes::{nodes_from_fragment, Role};
use crate::segment::{ConnectionType, EntryId, Segmented};
use serde::Serialize;
use std::fmt;
use tracing::debug;

const RESTART_FIRST_DISCOUNT: f64 = 0.5;
const RESTART_LATE_DISCOUNT: f64 = 0.25;

/// One `(descendant, root)` pairing of fragment texts, markers removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub descendant: String,
    pub root: String,
    /// Kind name of the root fragment.
    pub kind: String,
    pub place: usize,
    pub confidence: f64,
    pub entry_id: EntryId,
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every fragment was visited.
    Exhausted,
    Cognate,
    Restart,
    Compound,
    Unrecognized,
    /// `", "` between fragments of different languages.
    EquivalentLanguageMismatch,
    /// The languages around a `", "` could not be read.
    Undecidable,
    /// The entry did not start with the synthetic start fragment.
    MissingStart,
}

impl StopReason {
    pub const ALL: [StopReason; 8] = [
        StopReason::Exhausted,
        StopReason::Cognate,
        StopReason::Restart,
        StopReason::Compound,
        StopReason::Unrecognized,
        StopReason::EquivalentLanguageMismatch,
        StopReason::Undecidable,
        StopReason::MissingStart,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::Cognate => "cognate",
            StopReason::Restart => "restart",
            StopReason::Compound => "compound",
            StopReason::Unrecognized => "unrecognized",
            StopReason::EquivalentLanguageMismatch => "equivalent_language_mismatch",
            StopReason::Undecidable => "undecidable",
            StopReason::MissingStart => "missing_start",
        }
    }

    /// Cases the scan has no rule for; surfaced for review.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            StopReason::EquivalentLanguageMismatch | StopReason::Undecidable | StopReason::MissingStart
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The fragment a scan stopped on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoppedAt {
    pub place: usize,
    pub fragment: String,
    pub preceding_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub edges: Vec<Edge>,
    pub stop: StopReason,
    pub stopped_at: Option<StoppedAt>,
}

impl ScanOutcome {
    /// The unhandled fragment when nothing was linked before it.
    pub fn missed(&self) -> Option<&StoppedAt> {
        if self.stop == StopReason::Unrecognized && self.edges.is_empty() {
            self.stopped_at.as_ref()
        } else {
            None
        }
    }
}

/// Scan a segmented entry, tagging its fragments in place.
pub fn entry_connections(seg: &mut Segmented) -> ScanOutcome {
    let starts_right = seg.fragments.first().map_or(false, |f| f.is_start());
    let mut scan = Scan { seg, edges: Vec::new(), confidence: 1.0 };
    if !starts_right {
        return scan.finish(StopReason::MissingStart, None);
    }
    scan.seg.fragments[0].connection = Some(ConnectionType::Start);

    for i in 1..scan.seg.len() {
        if let Some(reason) = scan.step(i) {
            return scan.finish(reason, Some(i));
        }
    }
    scan.finish(StopReason::Exhausted, None)
}

struct Scan<'a> {
    seg: &'a mut Segmented,
    edges: Vec<Edge>,
    confidence: f64,
}

impl<'a> Scan<'a> {
    /// Apply the first matching rule to fragment `i`; `Some` ends the scan.
    fn step(&mut self, i: usize) -> Option<StopReason> {
        let fragment = &self.seg.fragments[i];
        let text = fragment.preceding_text.clone();
        let kind = fragment.template_kind();
        debug!(place = i, fragment = %fragment.key, preceding = ?text, "evaluating");

        if kind.is_cognate() || classify::is_cognate(&text) {
            debug!(place = i, "cognate, ending scan");
            self.tag(i, ConnectionType::Cognate);
            return Some(StopReason::Cognate);
        }

        if classify::is_restart(&text) {
            self.tag(i, ConnectionType::Restart);
            if self.edges.is_empty() {
                debug!(place = i, "restart, linking to the start");
                self.confidence *= RESTART_FIRST_DISCOUNT;
                self.connect(0, i);
                return None;
            }
            debug!(place = i, "restart after edges, ending scan");
            self.confidence *= RESTART_LATE_DISCOUNT;
            return Some(StopReason::Restart);
        }

        if classify::is_equivalent(&text) {
            return self.equivalent(i);
        }

        if classify::is_branch(&text) {
            self.siblings_update(i);
            if self.seg.has_tag(ConnectionType::Branch) {
                debug!(place = i, "repeat branch, no edge");
            } else {
                debug!(place = i, "first branch");
                self.connect_from_preceding(i);
            }
            self.tag(i, ConnectionType::Branch);
            return None;
        }

        if classify::is_from(&text) {
            let tag = if kind.is_branch() {
                ConnectionType::Branch
            } else {
                ConnectionType::DirectConnection
            };
            self.tag(i, tag);

            let after_branch = self.seg.fragments[i]
                .preceding
                .last()
                .map_or(true, |&p| self.seg.fragments[p].connection == Some(ConnectionType::Branch));
            if after_branch {
                debug!(place = i, "direct onto branch, no edge");
            } else {
                self.confidence = 1.0;
                self.connect_from_preceding(i);
            }
            return None;
        }

        if classify::is_compound_text(&text) {
            debug!(place = i, "compound, dropping the last edge");
            self.edges.pop();
            return Some(StopReason::Compound);
        }

        debug!(place = i, "unrecognized connective");
        self.tag(i, ConnectionType::Unknown);
        Some(StopReason::Unrecognized)
    }

    fn equivalent(&mut self, i: usize) -> Option<StopReason> {
        let Some(&prev) = self.seg.fragments[i].preceding.last() else {
            return Some(StopReason::Undecidable);
        };
        let prev_key = self.seg.fragments[prev].key.clone();
        let this_key = self.seg.fragments[i].key.clone();

        let languages = first_language(&prev_key).and_then(|a| first_language(&this_key).map(|b| (a, b)));
        match languages {
            Ok((a, b)) if a == b => {
                debug!(place = i, language = %a, "equivalent");
                self.siblings_update(i);
                self.connect_from_preceding(i);
                self.tag(i, ConnectionType::Equivalent);
                None
            }
            Ok((a, b)) => {
                debug!(place = i, previous = %a, current = %b, "equivalent across languages");
                Some(StopReason::EquivalentLanguageMismatch)
            }
            Err(err) => {
                debug!(place = i, error = %err, "equivalent undecidable");
                Some(StopReason::Undecidable)
            }
        }
    }

    /// Make fragment `i` a sibling of its predecessors: it takes over their
    /// predecessors, they point past it, and its followers see them too.
    fn siblings_update(&mut self, i: usize) {
        let frags = &mut self.seg.fragments;
        let siblings = frags[i].preceding.clone();
        let Some(&first) = siblings.first() else {
            return;
        };
        let following = frags[i].following.clone();

        for &s in &siblings {
            frags[s].following = following.clone();
        }
        frags[i].preceding = frags[first].preceding.clone();
        for &f in &following {
            let mut preceding = siblings.clone();
            preceding.extend_from_slice(&frags[f].preceding);
            frags[f].preceding = preceding;
        }
    }

    fn connect_from_preceding(&mut self, i: usize) {
        let preceding = self.seg.fragments[i].preceding.clone();
        for p in preceding {
            self.connect(p, i);
        }
    }

    fn connect(&mut self, descendant: usize, root: usize) {
        let desc = &self.seg.fragments[descendant];
        let root_fragment = &self.seg.fragments[root];
        debug!(descendant = %desc.key, root = %root_fragment.key, confidence = self.confidence, "edge");
        self.edges.push(Edge {
            descendant: desc.text().into_owned(),
            root: root_fragment.text().into_owned(),
            kind: root_fragment.kind.clone(),
            place: root_fragment.place,
            confidence: self.confidence,
            entry_id: self.seg.entry_id.clone(),
        });
    }

    fn tag(&mut self, i: usize, tag: ConnectionType) {
        self.seg.fragments[i].connection = Some(tag);
    }

    fn finish(self, stop: StopReason, at: Option<usize>) -> ScanOutcome {
        let stopped_at = at.and_then(|i| self.seg.get(i)).map(|f| StoppedAt {
            place: f.place,
            fragment: f.text().into_owned(),
            preceding_text: f.preceding_text.clone(),
        });
        ScanOutcome { edges: self.edges, stop, stopped_at }
    }
}

/// Language key of the first root-role node of a fragment.
fn first_language(fragment: &str) -> Result<String, crate::error::NodeError> {
    let nodes = nodes_from_fragment(fragment, Role::Root, true)?;
    Ok(nodes
        .first()
        .map(|n| n.language.key().to_string())
        .unwrap_or_default())
}
