//! Core data model types for the engine.
//!
//! Jobs read [`Record`]s, mappers turn them into intermediate `(String, V)` pairs, and the
//! shuffle stage consolidates those pairs into [`Group`]s for the reducers.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One line of input.
///
/// The text is stored verbatim, minus the line terminator. Records are immutable once read;
/// content validation is the mapper's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// File the record was read from, if it came from a file.
    pub origin: Option<Arc<Path>>,
    /// 1-based line number within `origin`.
    pub line: usize,
    /// Line content.
    pub text: String,
}

impl Record {
    /// Create a record without a file origin.
    pub fn new(line: usize, text: impl Into<String>) -> Self {
        Self {
            origin: None,
            line,
            text: text.into(),
        }
    }

    /// Create a record read from `origin`.
    pub fn with_origin(origin: Arc<Path>, line: usize, text: impl Into<String>) -> Self {
        Self {
            origin: Some(origin),
            line,
            text: text.into(),
        }
    }

    /// Build in-memory records from lines, numbering them from 1.
    pub fn from_lines<I, S>(lines: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::new(i + 1, text))
            .collect()
    }

    /// Record content.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(path) => write!(f, "{}:line {} {:?}", path.display(), self.line, self.text),
            None => write!(f, "line {} {:?}", self.line, self.text),
        }
    }
}

/// All intermediate values emitted under one key.
///
/// Values are in sequential emission order: by input record, then by emission order within
/// the mapper invocation that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<V> {
    /// Intermediate key.
    pub key: String,
    /// Values emitted under `key`.
    pub values: Vec<V>,
}

impl<V> Group<V> {
    /// Create a group.
    pub fn new(key: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// Number of values in the group.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the group holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Split into key and values.
    pub fn into_parts(self) -> (String, Vec<V>) {
        (self.key, self.values)
    }
}

/// Position of an intermediate emission in the sequential order of a job.
///
/// Ordering is by input record index, then by emission sequence inside that mapper invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmissionId {
    /// Index of the record in the job's input.
    pub record: usize,
    /// Emission sequence within the mapper invocation.
    pub seq: usize,
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::{EmissionId, Group, Record};

    #[test]
    fn from_lines_numbers_records_from_one() {
        let records = Record::from_lines(["a", "", "c"]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].line, 1);
        assert_eq!(records[1].text(), "");
        assert_eq!(records[2].line, 3);
    }

    #[test]
    fn record_display_includes_origin_when_present() {
        let origin: Arc<Path> = Arc::from(Path::new("baskets.txt"));
        let rec = Record::with_origin(origin, 4, "1,[a b]");
        assert_eq!(rec.to_string(), "baskets.txt:line 4 \"1,[a b]\"");
        assert_eq!(Record::new(2, "x").to_string(), "line 2 \"x\"");
    }

    #[test]
    fn emission_ids_order_by_record_then_seq() {
        let mut ids = vec![
            EmissionId { record: 2, seq: 0 },
            EmissionId { record: 0, seq: 1 },
            EmissionId { record: 0, seq: 0 },
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                EmissionId { record: 0, seq: 0 },
                EmissionId { record: 0, seq: 1 },
                EmissionId { record: 2, seq: 0 },
            ]
        );
    }

    #[test]
    fn group_into_parts() {
        let g = Group::new("k", vec![1, 2]);
        assert_eq!(g.len(), 2);
        assert!(!g.is_empty());
        assert_eq!(g.into_parts(), ("k".to_string(), vec![1, 2]));
    }
}
