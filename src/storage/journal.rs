//! Append-only JSON-lines journal
//!
//! One JSON document per line. Each append is flushed and synced before it
//! returns. A crash mid-append can only leave a torn final line without its
//! newline; replay drops that line and keeps everything before it.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;
use crate::errors::StorageError;

#[derive(Debug)]
pub struct Journal<T> {
    path: PathBuf,
    file: File,
    _entry: PhantomData<fn() -> T>,
}

/// How the file ended during replay.
enum Tail {
    Clean,
    /// Last entry parsed but has no newline yet.
    Unterminated,
    /// Last line is a partial write starting at this byte offset.
    Torn(u64),
}

impl<T: Serialize + DeserializeOwned> Journal<T> {
    /// Opens (creating if needed) the journal and returns every entry in
    /// write order.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<T>), StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error(&path, source))?;
        }

        let (entries, tail) = Self::replay(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        match tail {
            Tail::Clean => {}
            Tail::Unterminated => file
                .write_all(b"\n")
                .and_then(|_| file.sync_data())
                .map_err(|source| io_error(&path, source))?,
            Tail::Torn(offset) => {
                warn!(path = %path.display(), offset, "Dropping torn final journal line");
                file.set_len(offset)
                    .and_then(|_| file.sync_data())
                    .map_err(|source| io_error(&path, source))?;
            }
        }

        Ok((
            Self {
                path,
                file,
                _entry: PhantomData,
            },
            entries,
        ))
    }

    fn replay(path: &Path) -> Result<(Vec<T>, Tail), StorageError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), Tail::Clean)),
            Err(source) => return Err(io_error(path, source)),
        };

        let mut entries = Vec::new();
        let mut tail = Tail::Clean;
        let mut offset = 0;
        let mut line_number = 0;

        while offset < bytes.len() {
            line_number += 1;
            let rest = &bytes[offset..];
            let (line, terminated) = match rest.iter().position(|b| *b == b'\n') {
                Some(end) => (&rest[..end], true),
                None => (rest, false),
            };

            if !line.iter().all(u8::is_ascii_whitespace) {
                match serde_json::from_slice(line) {
                    Ok(entry) => {
                        entries.push(entry);
                        if !terminated {
                            tail = Tail::Unterminated;
                        }
                    }
                    Err(_) if !terminated => return Ok((entries, Tail::Torn(offset as u64))),
                    Err(e) => {
                        return Err(StorageError::Corrupt {
                            path: path.to_path_buf(),
                            line: line_number,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            offset += line.len() + usize::from(terminated);
        }
        Ok((entries, tail))
    }

    /// Appends one entry. On a failed write the file is cut back to its
    /// previous length so the next append starts on a clean line.
    pub fn append(&mut self, entry: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let before = self
            .file
            .metadata()
            .map_err(|source| io_error(&self.path, source))?
            .len();
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.sync_data());

        if let Err(source) = written {
            if let Err(e) = self.file.set_len(before) {
                warn!(path = %self.path.display(), error = %e, "Failed to roll back partial journal write");
            }
            return Err(io_error(&self.path, source));
        }
        Ok(())
    }

    /// Replaces the journal contents with `entries` via a temp file and an
    /// atomic rename.
    pub fn rewrite<'a, I>(&mut self, entries: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(|source| io_error(&tmp_path, source))?;
            for entry in entries {
                let mut line = serde_json::to_string(entry)?;
                line.push('\n');
                tmp.write_all(line.as_bytes())
                    .map_err(|source| io_error(&tmp_path, source))?;
            }
            tmp.sync_all().map_err(|source| io_error(&tmp_path, source))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|source| io_error(&self.path, source))?;

        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|source| io_error(&self.path, source))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}
