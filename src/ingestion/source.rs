//! Input source resolution.
//!
//! An input identifier resolves to one of three shapes:
//!
//! - an existing regular file
//! - an existing directory (every regular file below it, walked in file-name order with
//!   symlinks followed)
//! - a glob pattern, when the path does not exist but contains `*`, `?` or `[`

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{JobError, JobResult};

/// A resolved, line-oriented input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A single file.
    File(PathBuf),
    /// All regular files below a directory.
    Directory(PathBuf),
    /// All files matching a glob pattern.
    Pattern(String),
}

impl InputSource {
    /// Resolve an input identifier.
    ///
    /// Returns [`JobError::NotFound`] if the path does not exist and is not a pattern.
    pub fn resolve(identifier: impl AsRef<Path>) -> JobResult<Self> {
        let path = identifier.as_ref();
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(Self::Directory(path.to_path_buf())),
            Ok(_) => Ok(Self::File(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let raw = path.to_string_lossy();
                if looks_like_pattern(&raw) {
                    Ok(Self::Pattern(raw.into_owned()))
                } else {
                    Err(JobError::NotFound {
                        path: path.to_path_buf(),
                    })
                }
            }
            Err(e) => Err(JobError::io(path, e)),
        }
    }

    /// List the files this source reads, in read order.
    ///
    /// A directory or pattern that yields no files is reported as [`JobError::NotFound`].
    pub fn files(&self) -> JobResult<Vec<PathBuf>> {
        let files = match self {
            Self::File(path) => vec![path.clone()],
            Self::Directory(dir) => {
                let mut out = Vec::new();
                for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                    let entry = entry.map_err(|e| {
                        let path = e.path().unwrap_or(dir).to_path_buf();
                        match e.into_io_error() {
                            Some(io) => JobError::io(path, io),
                            None => JobError::Io {
                                path,
                                source: std::io::Error::other("filesystem loop detected"),
                            },
                        }
                    })?;
                    if entry.file_type().is_file() {
                        out.push(entry.into_path());
                    }
                }
                out
            }
            Self::Pattern(pattern) => {
                let paths = glob::glob(pattern).map_err(|e| JobError::InvalidSource {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                let mut out = Vec::new();
                for entry in paths {
                    let path = entry.map_err(|e| {
                        let path = e.path().to_path_buf();
                        JobError::io(path, e.into_error())
                    })?;
                    if path.is_file() {
                        out.push(path);
                    }
                }
                out
            }
        };

        if files.is_empty() {
            return Err(JobError::NotFound {
                path: self.display_path(),
            });
        }
        Ok(files)
    }

    fn display_path(&self) -> PathBuf {
        match self {
            Self::File(p) | Self::Directory(p) => p.clone(),
            Self::Pattern(p) => PathBuf::from(p),
        }
    }
}

fn looks_like_pattern(raw: &str) -> bool {
    raw.contains(['*', '?', '['])
}
