//! Error types for node extraction and configuration loading.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a fragment pair could not be turned into node connections.
///
/// None of these abort a batch; the pair is dropped and counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("empty word or language in {fragment}")]
    EmptyWordOrLanguage { fragment: String },

    #[error("{fragment} is a comparison, not a lineage step")]
    Cognate { fragment: String },

    #[error("no nodes produced by {fragment}")]
    NoNodes { fragment: String },

    #[error("{fragment} has several parts and cannot be a descendant")]
    AmbiguousShape { fragment: String },

    #[error("{roots} root nodes and {descendants} descendant nodes, pairing is unclear")]
    MultipleAmbiguousRoots { roots: usize, descendants: usize },

    #[error("no word found in {fragment}")]
    MissingWord { fragment: String },

    #[error("unknown language code {code:?}")]
    UnknownLanguage { code: String },

    #[error("unsupported fragment kind {kind:?}")]
    UnsupportedKind { kind: String },
}

/// Stable label for aggregate counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyWordOrLanguage,
    Cognate,
    NoNodes,
    AmbiguousShape,
    MultipleAmbiguousRoots,
    MissingWord,
    UnknownLanguage,
    UnsupportedKind,
}

impl FailureKind {
    pub const ALL: [FailureKind; 8] = [
        FailureKind::EmptyWordOrLanguage,
        FailureKind::Cognate,
        FailureKind::NoNodes,
        FailureKind::AmbiguousShape,
        FailureKind::MultipleAmbiguousRoots,
        FailureKind::MissingWord,
        FailureKind::UnknownLanguage,
        FailureKind::UnsupportedKind,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::EmptyWordOrLanguage => "empty_word_or_language",
            FailureKind::Cognate => "cognate",
            FailureKind::NoNodes => "no_nodes",
            FailureKind::AmbiguousShape => "ambiguous_shape",
            FailureKind::MultipleAmbiguousRoots => "multiple_ambiguous_roots",
            FailureKind::MissingWord => "missing_word",
            FailureKind::UnknownLanguage => "unknown_language",
            FailureKind::UnsupportedKind => "unsupported_kind",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl NodeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            NodeError::EmptyWordOrLanguage { .. } => FailureKind::EmptyWordOrLanguage,
            NodeError::Cognate { .. } => FailureKind::Cognate,
            NodeError::NoNodes { .. } => FailureKind::NoNodes,
            NodeError::AmbiguousShape { .. } => FailureKind::AmbiguousShape,
            NodeError::MultipleAmbiguousRoots { .. } => FailureKind::MultipleAmbiguousRoots,
            NodeError::MissingWord { .. } => FailureKind::MissingWord,
            NodeError::UnknownLanguage { .. } => FailureKind::UnknownLanguage,
            NodeError::UnsupportedKind { .. } => FailureKind::UnsupportedKind,
        }
    }
}

/// Failures while loading tables from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON in {path:?} line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not find schema/{0}, use --languages to specify a path")]
    NotFound(String),
}
