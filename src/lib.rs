//! Etymology connection extraction from Wiktionary wikitext.
//!
//! An entry's etymology text is preprocessed, split into template fragments
//! with the connective text between them, and scanned once to produce
//! (descendant, root) edges. Each edge is then resolved into word/language
//! node pairs.
//!
//! ```text
//! wikitext -> preprocess -> segment -> connections -> pairs
//! ```

pub mod classify;
pub mod connections;
pub mod error;
pub mod expand;
pub mod languages;
pub mod nodes;
pub mod normalize;
pub mod pairs;
pub mod parallel;
pub mod pipeline;
pub mod preprocess;
pub mod registry;
pub mod segment;
pub mod template;
pub mod wikitext;

pub use connections::{entry_connections, Edge, ScanOutcome, StopReason};
pub use error::{ConfigError, FailureKind, NodeError};
pub use languages::LanguageTable;
pub use pairs::{node_connections, NodeConnection, WordNode};
pub use pipeline::{EntryRecord, EntryReport, Extractor, ReportWriter, Stats};
pub use segment::{segment_entry, EntryId, Segmented};
