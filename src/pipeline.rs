//! Per-entry driver, aggregate statistics and the JSONL records the CLI writes.

use crate::connections::{entry_connections, StopReason};
use crate::error::FailureKind;
use crate::expand::{expand_fragments, ExpansionTable};
use crate::languages::LanguageTable;
use crate::pairs::{node_connections, NodeConnection};
use crate::registry::WordIds;
use crate::segment::{segment_entry, EntryId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::warn;

/// One input line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntryRecord {
    #[serde(default)]
    pub wikitext: String,
    pub language_name: String,
    pub word: String,
    #[serde(default)]
    pub entry_id: EntryId,
}

/// Diagnostic record for the `--failures` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureRecord {
    /// An edge whose fragments did not resolve into node connections.
    DroppedPair {
        entry_id: EntryId,
        descendant: String,
        root: String,
        place: usize,
        failure: FailureKind,
        message: String,
    },
    /// An entry whose first fragment followed text no rule recognizes.
    Missed {
        entry_id: EntryId,
        word: String,
        language_name: String,
        place: usize,
        fragment: String,
        preceding_text: String,
    },
    /// A scan that ended on a case with no rule.
    Unsupported {
        entry_id: EntryId,
        word: String,
        language_name: String,
        stop: StopReason,
        place: Option<usize>,
        fragment: Option<String>,
    },
    /// An entry whose processing panicked. Nothing else was recorded for it.
    Panicked { index: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Processed,
    EmptyEtymology,
    Malformed,
    Panicked,
}

/// Everything produced for one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryReport {
    /// Position of the line among non-blank input lines.
    pub index: usize,
    pub status: EntryStatus,
    pub edges: usize,
    pub stop: Option<StopReason>,
    pub missed: bool,
    pub connections: Vec<NodeConnection>,
    pub failures: Vec<FailureRecord>,
}

impl EntryReport {
    fn empty(index: usize, status: EntryStatus) -> Self {
        EntryReport {
            index,
            status,
            edges: 0,
            stop: None,
            missed: false,
            connections: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn panicked(index: usize, message: String) -> Self {
        let mut report = EntryReport::empty(index, EntryStatus::Panicked);
        report.failures.push(FailureRecord::Panicked { index, message });
        report
    }
}

/// Text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `f`, turning a panic into a `Panicked` report for `index`.
pub fn guarded(index: usize, f: impl FnOnce() -> EntryReport) -> EntryReport {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(report) => report,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(line = index + 1, error = %message, "entry processing panicked");
            EntryReport::panicked(index, message)
        }
    }
}

/// Runs the whole chain for one entry. Shared read-only between workers.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    languages: LanguageTable,
    expansions: Option<ExpansionTable>,
}

impl Extractor {
    pub fn new(languages: LanguageTable) -> Self {
        Extractor { languages, expansions: None }
    }

    pub fn with_expansions(mut self, expansions: ExpansionTable) -> Self {
        self.expansions = Some(expansions);
        self
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    /// Parse and process one JSONL line. A panic while processing becomes
    /// a `Panicked` report instead of taking down the caller.
    pub fn process_line(&self, index: usize, line: &str) -> EntryReport {
        match serde_json::from_str::<EntryRecord>(line) {
            Ok(entry) => guarded(index, || self.process(index, &entry)),
            Err(err) => {
                warn!(line = index + 1, error = %err, "malformed entry");
                EntryReport::empty(index, EntryStatus::Malformed)
            }
        }
    }

    pub fn process(&self, index: usize, entry: &EntryRecord) -> EntryReport {
        if entry.wikitext.trim().is_empty() {
            return EntryReport::empty(index, EntryStatus::EmptyEtymology);
        }

        let wikitext = match &self.expansions {
            Some(table) => expand_fragments(&entry.wikitext, table, true),
            None => entry.wikitext.clone(),
        };

        let mut seg = segment_entry(&wikitext, &entry.language_name, &entry.word, entry.entry_id.clone());
        let outcome = entry_connections(&mut seg);

        let mut report = EntryReport::empty(index, EntryStatus::Processed);
        report.edges = outcome.edges.len();
        report.stop = Some(outcome.stop);

        for edge in &outcome.edges {
            match node_connections(edge, &self.languages) {
                Ok(conns) => report.connections.extend(conns),
                Err(err) => report.failures.push(FailureRecord::DroppedPair {
                    entry_id: edge.entry_id.clone(),
                    descendant: edge.descendant.clone(),
                    root: edge.root.clone(),
                    place: edge.place,
                    failure: err.kind(),
                    message: err.to_string(),
                }),
            }
        }

        if let Some(missed) = outcome.missed() {
            report.missed = true;
            report.failures.push(FailureRecord::Missed {
                entry_id: entry.entry_id.clone(),
                word: entry.word.clone(),
                language_name: entry.language_name.clone(),
                place: missed.place,
                fragment: missed.fragment.clone(),
                preceding_text: missed.preceding_text.clone(),
            });
        }

        if outcome.stop.is_unsupported() {
            warn!(
                entry_id = %entry.entry_id,
                word = %entry.word,
                stop = %outcome.stop,
                "scan ended on an unsupported case"
            );
            report.failures.push(FailureRecord::Unsupported {
                entry_id: entry.entry_id.clone(),
                word: entry.word.clone(),
                language_name: entry.language_name.clone(),
                stop: outcome.stop,
                place: outcome.stopped_at.as_ref().map(|s| s.place),
                fragment: outcome.stopped_at.as_ref().map(|s| s.fragment.clone()),
            });
        }

        report
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub entries_read: usize,
    pub entries_processed: usize,
    pub skipped_empty: usize,
    pub malformed: usize,
    pub panicked: usize,
    /// Entries read but never reported, e.g. from a worker that died.
    pub lost: usize,
    pub edges: usize,
    pub connections_written: usize,
    pub dropped: BTreeMap<FailureKind, usize>,
    pub missed: usize,
    pub stops: BTreeMap<StopReason, usize>,
    pub elapsed: Duration,
}

impl Stats {
    pub fn record(&mut self, report: &EntryReport) {
        self.entries_read += 1;
        match report.status {
            EntryStatus::Processed => self.entries_processed += 1,
            EntryStatus::EmptyEtymology => self.skipped_empty += 1,
            EntryStatus::Malformed => self.malformed += 1,
            EntryStatus::Panicked => self.panicked += 1,
        }
        self.edges += report.edges;
        if report.missed {
            self.missed += 1;
        }
        if let Some(stop) = report.stop {
            *self.stops.entry(stop).or_default() += 1;
        }
        for failure in &report.failures {
            if let FailureRecord::DroppedPair { failure, .. } = failure {
                *self.dropped.entry(*failure).or_default() += 1;
            }
        }
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Row written instead of a [`NodeConnection`] when ids are assigned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdRow {
    pub root_id: u64,
    pub desc_id: u64,
    pub entry_id: EntryId,
    pub place: usize,
    pub confidence: f64,
}

/// Writes reports in the order it is given them and keeps the counts.
pub struct ReportWriter<W: Write> {
    out: W,
    failures: Option<Box<dyn Write>>,
    ids: Option<WordIds>,
    limit: Option<usize>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        ReportWriter { out, failures: None, ids: None, limit: None }
    }

    pub fn with_failures(mut self, failures: Box<dyn Write>) -> Self {
        self.failures = Some(failures);
        self
    }

    pub fn with_ids(mut self, ids: WordIds) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Record and write one report. Returns `true` once the limit is reached.
    pub fn write(&mut self, report: EntryReport, stats: &mut Stats) -> io::Result<bool> {
        stats.record(&report);

        if let Some(failures) = self.failures.as_mut() {
            for failure in &report.failures {
                serde_json::to_writer(&mut *failures, failure).map_err(io::Error::from)?;
                writeln!(failures)?;
            }
        }

        for conn in report.connections {
            let written = match self.ids.as_mut() {
                Some(ids) => {
                    let row = IdRow {
                        root_id: ids.id_for(&conn.root.word, &conn.root.language_name),
                        desc_id: ids.id_for(&conn.descendant.word, &conn.descendant.language_name),
                        entry_id: conn.entry_id,
                        place: conn.place,
                        confidence: conn.confidence,
                    };
                    serde_json::to_writer(&mut self.out, &row)
                }
                None => serde_json::to_writer(&mut self.out, &conn),
            };
            written.map_err(io::Error::from)?;
            writeln!(self.out)?;
            stats.connections_written += 1;

            if let Some(l) = self.limit {
                if stats.connections_written >= l {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Flush everything and hand back the id table, if one was used.
    pub fn finish(mut self) -> io::Result<Option<WordIds>> {
        self.out.flush()?;
        if let Some(failures) = self.failures.as_mut() {
            failures.flush()?;
        }
        Ok(self.ids)
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use std::collections::HashMap;

    fn extractor() -> Extractor {
        let mut base = HashMap::new();
        for (code, name) in [("en", "English"), ("enm", "Middle English"), ("fro", "Old French"), ("la", "Latin")] {
            base.insert(code.to_string(), name.to_string());
        }
        Extractor::new(LanguageTable::from_map(base))
    }

    const PEACH: &str = r#"{"wikitext": "From {{inh|en|enm|peche}}, borrowed from {{der|en|fro|pesche}}.", "language_name": "English", "word": "peach", "entry_id": 12}"#;

    // ─────────────────────────────────────────────────────────────
    // Extractor
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn processes_a_line() {
        let report = extractor().process_line(0, PEACH);
        assert_eq!(report.status, EntryStatus::Processed);
        assert_eq!(report.edges, 2);
        assert_eq!(report.stop, Some(StopReason::Exhausted));
        let pairs: Vec<(&str, &str)> = report
            .connections
            .iter()
            .map(|c| (c.descendant.word.as_str(), c.root.word.as_str()))
            .collect();
        assert_eq!(pairs, vec![("peach", "peche"), ("peche", "pesche")]);
        assert_eq!(report.connections[1].root.language_name, "Old French");
        assert_eq!(report.connections[0].entry_id, EntryId::Number(12));
        assert!(report.failures.is_empty());
    }

    #[test]
    fn malformed_and_empty() {
        let ex = extractor();
        assert_eq!(ex.process_line(0, "{not json").status, EntryStatus::Malformed);
        let empty = r#"{"wikitext": "  ", "language_name": "English", "word": "x"}"#;
        assert_eq!(ex.process_line(1, empty).status, EntryStatus::EmptyEtymology);
    }

    #[test]
    fn dropped_pairs_reported() {
        let line = r#"{"wikitext": "From {{m|zz|x}}", "language_name": "English", "word": "y"}"#;
        let report = extractor().process_line(0, line);
        assert!(report.connections.is_empty());
        assert!(matches!(
            &report.failures[0],
            FailureRecord::DroppedPair { failure: FailureKind::UnknownLanguage, .. }
        ));
    }

    #[test]
    fn missed_and_unsupported_reported() {
        let ex = extractor();
        let missed = r#"{"wikitext": "Blah {{m|la|x}}", "language_name": "English", "word": "y"}"#;
        let report = ex.process_line(0, missed);
        assert!(report.missed);
        assert!(matches!(report.failures[0], FailureRecord::Missed { place: 1, .. }));

        let mismatch = r#"{"wikitext": "From {{der|en|fro|a}}, {{der|en|la|b}}", "language_name": "English", "word": "y"}"#;
        let report = ex.process_line(1, mismatch);
        assert_eq!(report.stop, Some(StopReason::EquivalentLanguageMismatch));
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f, FailureRecord::Unsupported { place: Some(2), .. })));
    }

    #[test]
    fn expansions_applied_first() {
        let mut table = ExpansionTable::new();
        table.insert("{{etyl|la|en}}", "Latin");
        let ex = extractor().with_expansions(table);
        let line = r#"{"wikitext": "From {{etyl|la|en}} {{m|la|pēs}}", "language_name": "English", "word": "y"}"#;
        let report = ex.process_line(0, line);
        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].root.word, "pēs");
    }

    // ─────────────────────────────────────────────────────────────
    // Writer and stats
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn writer_counts_and_writes() {
        let ex = extractor();
        let mut stats = Stats::default();
        let mut writer = ReportWriter::new(Vec::new());
        writer.write(ex.process_line(0, PEACH), &mut stats).unwrap();
        writer.write(ex.process_line(1, "oops"), &mut stats).unwrap();

        assert_eq!(stats.entries_read, 2);
        assert_eq!(stats.entries_processed, 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.connections_written, 2);
        assert_eq!(stats.stops.get(&StopReason::Exhausted), Some(&1));

        let out = String::from_utf8(writer.out.clone()).unwrap();
        let first: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(first["descendant"]["word"], "peach");
        assert_eq!(first["root"]["language_name"], "Middle English");
        assert_eq!(first["entry_id"], 12);
    }

    #[test]
    fn writer_stops_at_limit() {
        let mut stats = Stats::default();
        let mut writer = ReportWriter::new(Vec::new()).with_limit(Some(1));
        let done = writer.write(extractor().process_line(0, PEACH), &mut stats).unwrap();
        assert!(done);
        assert_eq!(stats.connections_written, 1);
    }

    #[test]
    fn writer_assigns_ids() {
        let mut stats = Stats::default();
        let mut writer = ReportWriter::new(Vec::new()).with_ids(WordIds::new());
        writer.write(extractor().process_line(0, PEACH), &mut stats).unwrap();
        let out = String::from_utf8(writer.out.clone()).unwrap();
        let rows: Vec<serde_json::Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(rows[0]["root_id"], 0);
        assert_eq!(rows[0]["desc_id"], 1);
        // "peche" keeps its id as the descendant of the second pair
        assert_eq!(rows[1]["desc_id"], 0);
        assert_eq!(rows[1]["root_id"], 2);

        let ids = writer.finish().unwrap().unwrap();
        assert_eq!(ids.unmatched().len(), 3);
    }

    #[test]
    fn template_closer_inside_link_is_processed() {
        let line = r#"{"wikitext": "From [[éx}} {{m|la|x}}", "language_name": "English", "word": "y"}"#;
        let report = extractor().process_line(0, line);
        assert_eq!(report.status, EntryStatus::Processed);
        assert_eq!(report.edges, 0);
        assert!(report.connections.is_empty());
    }

    #[test]
    fn panic_becomes_failure_record() {
        let report = guarded(4, || panic!("bad fragment"));
        assert_eq!(report.status, EntryStatus::Panicked);
        assert_eq!(
            report.failures,
            vec![FailureRecord::Panicked { index: 4, message: "bad fragment".into() }]
        );

        let mut stats = Stats::default();
        let mut writer = ReportWriter::new(Vec::new()).with_failures(Box::new(Vec::<u8>::new()));
        writer.write(report, &mut stats).unwrap();
        writer.write(guarded(5, || extractor().process_line(5, PEACH)), &mut stats).unwrap();
        assert_eq!(stats.entries_read, 2);
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.entries_processed, 1);
        assert_eq!(stats.connections_written, 2);
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_propagate() {
        let mut stats = Stats::default();
        let mut writer = ReportWriter::new(BrokenPipe);
        let err = writer.write(extractor().process_line(0, PEACH), &mut stats).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(stats.connections_written, 0);

        let line = r#"{"wikitext": "From {{m|zz|x}}", "language_name": "English", "word": "y"}"#;
        let mut writer = ReportWriter::new(Vec::new()).with_failures(Box::new(BrokenPipe));
        assert!(writer.write(extractor().process_line(0, line), &mut stats).is_err());
    }
}

