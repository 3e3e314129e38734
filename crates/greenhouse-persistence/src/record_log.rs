//! ---
//! gh_section: "03-persistence-logging"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Persistence abstractions and storage bindings."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{PersistenceError, Result};

/// Current record log format version.
pub const LOG_FORMAT_VERSION: u16 = 1;

/// Header stored as the first line of every record log.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogHeader {
    version: u16,
    stream: String,
    created_at: DateTime<Utc>,
    hash: String,
}

impl LogHeader {
    fn new(stream: &str) -> Self {
        let created_at = Utc::now();
        let mut hasher = Sha256::new();
        hasher.update(stream.as_bytes());
        hasher.update(created_at.to_rfc3339().as_bytes());
        Self {
            version: LOG_FORMAT_VERSION,
            stream: stream.to_owned(),
            created_at,
            hash: hex::encode(hasher.finalize()),
        }
    }
}

/// One persisted record together with the metadata assigned on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry<T> {
    /// Sequential identifier, starting at 1 after creation or truncation.
    pub sequence: u64,
    /// Time the record was appended.
    pub timestamp: DateTime<Utc>,
    /// The record payload.
    pub record: T,
}

#[derive(Deserialize)]
struct SequenceOnly {
    sequence: u64,
}

/// Append-only JSON-lines log of typed records.
pub struct RecordLog<T> {
    path: PathBuf,
    stream: String,
    writer: BufWriter<File>,
    next_sequence: u64,
    len: usize,
    _record: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for RecordLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("path", &self.path)
            .field("stream", &self.stream)
            .field("next_sequence", &self.next_sequence)
            .field("len", &self.len)
            .finish()
    }
}

impl<T> RecordLog<T> {
    /// Open a log for appending, writing a header if the file is new or empty.
    pub fn open(path: &Path, stream: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let fresh = !path.exists() || fs::metadata(path)?.len() == 0;
        let (next_sequence, len) = if fresh {
            (0, 0)
        } else {
            scan_existing(path)?
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if fresh {
            write_header(&mut writer, stream)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            stream: stream.to_owned(),
            writer,
            next_sequence,
            len,
            _record: PhantomData,
        })
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequence number of the most recently appended record (0 when empty).
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Access the current path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Discard every record, rewriting a fresh header. Returns the number of dropped records.
    pub fn truncate(&mut self) -> Result<usize> {
        self.writer.flush()?;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        drop(file);
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        write_header(&mut self.writer, &self.stream)?;
        let dropped = self.len;
        self.len = 0;
        self.next_sequence = 0;
        debug!(path = %self.path.display(), dropped, "record log truncated");
        Ok(dropped)
    }
}

impl<T: Serialize> RecordLog<T> {
    /// Append a record and return the assigned sequence number and byte count.
    pub fn append(&mut self, record: &T) -> Result<(u64, usize)> {
        let entry = LogEntry {
            sequence: self.next_sequence + 1,
            timestamp: Utc::now(),
            record,
        };
        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.next_sequence = entry.sequence;
        self.len += 1;
        Ok((entry.sequence, line.len() + 1))
    }
}

impl<T: DeserializeOwned> RecordLog<T> {
    /// Read every stored entry in append order.
    pub fn entries(&self) -> Result<Vec<LogEntry<T>>> {
        RecordLogReader::<T>::open(&self.path)?.collect()
    }

    /// Read the most recently appended entry, if any.
    pub fn last(&self) -> Result<Option<LogEntry<T>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut last = None;
        for entry in RecordLogReader::<T>::open(&self.path)? {
            last = Some(entry?);
        }
        Ok(last)
    }
}

fn write_header(writer: &mut BufWriter<File>, stream: &str) -> Result<()> {
    let header = LogHeader::new(stream);
    let line = serde_json::to_string(&header)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Parse the header line, returning it with the number of bytes it occupied.
fn read_header(path: &Path, reader: &mut BufReader<File>) -> Result<(LogHeader, usize)> {
    let mut first_line = String::new();
    let consumed = reader.read_line(&mut first_line)?;
    let header: LogHeader =
        serde_json::from_str(first_line.trim()).map_err(|_| PersistenceError::CorruptHeader {
            path: path.to_path_buf(),
        })?;
    if header.version != LOG_FORMAT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(header.version));
    }
    Ok((header, consumed))
}

/// Count the stored records and find the last sequence number.
///
/// A trailing line without a newline is what an interrupted append leaves
/// behind; it is dropped and the file is cut back to the last full record.
fn scan_existing(path: &Path) -> Result<(u64, usize)> {
    let mut reader = BufReader::new(File::open(path)?);
    let (_, header_len) = read_header(path, &mut reader)?;
    let mut valid_end = header_len as u64;
    let mut last_seq = 0u64;
    let mut count = 0usize;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        if !line.ends_with('\n') {
            warn!(
                path = %path.display(),
                discarded_bytes = read,
                "dropping unterminated trailing record"
            );
            drop(reader);
            OpenOptions::new().write(true).open(path)?.set_len(valid_end)?;
            break;
        }
        if !line.trim().is_empty() {
            let entry: SequenceOnly = serde_json::from_str(line.trim())?;
            last_seq = entry.sequence;
            count += 1;
        }
        valid_end += read as u64;
    }
    Ok((last_seq, count))
}

/// Replay the log in order, invoking the callback for each entry.
pub fn replay<T, F>(path: &Path, mut handler: F) -> Result<usize>
where
    T: DeserializeOwned,
    F: FnMut(LogEntry<T>) -> Result<()>,
{
    let mut count = 0usize;
    for entry in RecordLogReader::<T>::open(path)? {
        handler(entry?)?;
        count += 1;
    }
    Ok(count)
}

/// Streaming iterator over the entries of a record log.
///
/// Opening never writes. An unterminated final line ends the iteration.
pub struct RecordLogReader<T> {
    path: PathBuf,
    reader: BufReader<File>,
    line: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> RecordLogReader<T> {
    /// Open the log for sequential reading, validating its header.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        read_header(path, &mut reader)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            line: String::new(),
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for RecordLogReader<T> {
    type Item = Result<LogEntry<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(read) if !self.line.ends_with('\n') => {
                    debug!(
                        path = %self.path.display(),
                        discarded_bytes = read,
                        "skipping unterminated trailing record"
                    );
                    return None;
                }
                Ok(_) if self.line.trim().is_empty() => continue,
                Ok(_) => {
                    return Some(
                        serde_json::from_str(self.line.trim()).map_err(PersistenceError::from),
                    )
                }
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}
