//! Record reading.
//!
//! Most callers should use [`read`], which resolves an input identifier to an [`InputSource`]
//! and reads every line of every file it names, in order.
//!
//! - [`source`]: file / directory / glob resolution
//! - [`lines`]: line-by-line record reading from paths or any `BufRead`

pub mod lines;
pub mod source;

use std::path::Path;

use crate::error::JobResult;
use crate::types::Record;

pub use lines::{read_from_reader, read_lines_from_path};
pub use source::InputSource;

/// Read all records named by `source`.
///
/// Records from multiple files are concatenated in file order; line numbers restart at 1 for
/// each file.
///
/// # Errors
///
/// - [`crate::JobError::NotFound`] if the source does not exist (or matches no files)
/// - [`crate::JobError::Io`] if a file exists but cannot be opened or read
///
/// ```no_run
/// use rust_map_reduce::ingestion::read;
///
/// # fn main() -> Result<(), rust_map_reduce::JobError> {
/// let records = read("baskets/*.txt")?;
/// println!("records={}", records.len());
/// # Ok(())
/// # }
/// ```
pub fn read(source: impl AsRef<Path>) -> JobResult<Vec<Record>> {
    let source = InputSource::resolve(source)?;
    let mut records = Vec::new();
    for file in source.files()? {
        records.extend(read_lines_from_path(&file)?);
    }
    Ok(records)
}
