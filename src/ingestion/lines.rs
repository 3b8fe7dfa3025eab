//! Line record reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::error::{JobError, JobResult};
use crate::types::Record;

/// Read every line of a file as a [`Record`].
///
/// Blank and malformed lines are returned verbatim; only the line terminator is stripped.
pub fn read_lines_from_path(path: impl AsRef<Path>) -> JobResult<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| JobError::io(path, e))?;
    let origin: Arc<Path> = Arc::from(path);
    read_from_reader(BufReader::new(file), Some(origin))
}

/// Read every line from an existing reader.
///
/// `origin` is attached to each record for diagnostics. Invalid UTF-8 is reported as
/// [`JobError::Io`].
pub fn read_from_reader<R: BufRead>(
    reader: R,
    origin: Option<Arc<Path>>,
) -> JobResult<Vec<Record>> {
    let mut records = Vec::new();
    for (idx0, line) in reader.lines().enumerate() {
        let text = line.map_err(|e| {
            let path = origin
                .as_deref()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| "<reader>".into());
            JobError::Io { path, source: e }
        })?;
        records.push(Record {
            origin: origin.clone(),
            line: idx0 + 1,
            text,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::read_from_reader;
    use crate::error::JobError;

    #[test]
    fn preserves_blank_and_malformed_lines_in_order() {
        let input = "1,[bread milk]\n\n   \nno brackets here\r\n2,[eggs]";
        let records = read_from_reader(Cursor::new(input), None).unwrap();

        let texts: Vec<_> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["1,[bread milk]", "", "   ", "no brackets here", "2,[eggs]"]
        );
        let lines: Vec<_> = records.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_input_yields_no_records() {
        let records = read_from_reader(Cursor::new(""), None).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn invalid_utf8_is_an_io_error() {
        let bytes: &[u8] = b"ok\n\xff\xfe\n";
        let err = read_from_reader(Cursor::new(bytes), None).unwrap_err();
        assert!(matches!(err, JobError::Io { .. }));
    }
}
