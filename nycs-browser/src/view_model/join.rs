//! Client-side join of schools with their SAT scores

use nycs_common::{School, ScoreRecord};
use serde::Serialize;
use std::collections::HashMap;

/// A school paired with its score record, if the dataset has one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedEntry {
    pub school: School,
    pub scores: Option<ScoreRecord>,
}

/// Schools joined with scores by `dbn`, in directory order
///
/// Each school id appears once. Lookups go through the id index rather than
/// whole-record equality.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinedView {
    entries: Vec<JoinedEntry>,
    index: HashMap<String, usize>,
}

impl JoinedView {
    /// Join `schools` with `scores`
    ///
    /// Duplicate school ids keep the first school; duplicate score ids keep
    /// the first score record.
    pub fn join(schools: &[School], scores: &[ScoreRecord]) -> Self {
        let mut scores_by_dbn: HashMap<&str, &ScoreRecord> = HashMap::with_capacity(scores.len());
        for record in scores {
            scores_by_dbn.entry(record.dbn.as_str()).or_insert(record);
        }

        let mut view = Self {
            entries: Vec::with_capacity(schools.len()),
            index: HashMap::with_capacity(schools.len()),
        };

        for school in schools {
            if view.index.contains_key(&school.dbn) {
                tracing::debug!(dbn = %school.dbn, "Skipping duplicate school id");
                continue;
            }
            view.push(JoinedEntry {
                school: school.clone(),
                scores: scores_by_dbn.get(school.dbn.as_str()).map(|r| (*r).clone()),
            });
        }

        view
    }

    /// Build a view from entries that already have unique ids
    pub(crate) fn from_entries(entries: Vec<JoinedEntry>) -> Self {
        let mut view = Self {
            entries: Vec::with_capacity(entries.len()),
            index: HashMap::with_capacity(entries.len()),
        };
        for entry in entries {
            view.push(entry);
        }
        view
    }

    fn push(&mut self, entry: JoinedEntry) {
        self.index.insert(entry.school.dbn.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[JoinedEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinedEntry> {
        self.entries.iter()
    }

    pub fn get(&self, dbn: &str) -> Option<&JoinedEntry> {
        self.index.get(dbn).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, dbn: &str) -> bool {
        self.index.contains_key(dbn)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of schools that have a score record
    pub fn scored_count(&self) -> usize {
        self.entries.iter().filter(|e| e.scores.is_some()).count()
    }
}
