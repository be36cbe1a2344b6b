//! In-memory `(word, language)` -> id assignment.

use crate::error::ConfigError;
use crate::normalize::{clean_word, remove_diacritics};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// One row of the word table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub id: u64,
    pub word: String,
    pub language_name: String,
}

/// Assigns stable ids to words, falling back to a diacritic-free match
/// before allocating a new id.
#[derive(Debug, Default)]
pub struct WordIds {
    ids: HashMap<(String, String), u64>,
    next_id: u64,
    unmatched: Vec<WordRecord>,
}

impl WordIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = WordRecord>) -> Self {
        let mut ids = HashMap::new();
        let mut next_id = 0;
        for record in records {
            next_id = next_id.max(record.id + 1);
            ids.insert((record.word, record.language_name), record.id);
        }
        WordIds { ids, next_id, unmatched: Vec::new() }
    }

    /// Seed from a JSONL word table; blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: WordRecord = serde_json::from_str(&line).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })?;
            records.push(record);
        }

        debug!(path = %path.display(), words = records.len(), "loaded word table");
        Ok(Self::from_records(records))
    }

    /// Id for a word, allocating one when neither the cleaned nor the
    /// diacritic-free form is known.
    pub fn id_for(&mut self, word: &str, language_name: &str) -> u64 {
        let cleaned = clean_word(word);
        if let Some(&id) = self.ids.get(&(cleaned.clone(), language_name.to_string())) {
            return id;
        }

        let plain = remove_diacritics(&cleaned);
        let key = (plain, language_name.to_string());
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.unmatched.push(WordRecord {
            id,
            word: key.0.clone(),
            language_name: key.1.clone(),
        });
        self.ids.insert(key, id);
        id
    }

    /// Words that received a new id, in allocation order.
    pub fn unmatched(&self) -> &[WordRecord] {
        &self.unmatched
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
