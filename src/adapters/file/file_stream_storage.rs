// File backed implementation of the StreamStorage port.
//
// Layout
// - One file per stream: <root>/<aggregate type>/<aggregate id>.jsonl
// - One line per committed batch, holding the JSON array of its events.
//
// Atomicity
// - A batch becomes visible when its terminating newline is on disk. A trailing
//   line without one is a torn write: readers skip it and the next append cuts it off.
// - Appends hold an exclusive fs2 lock on the stream file, so separate processes
//   sharing a data directory still get compare-and-append semantics.
// - Readers take no lock.

use crate::core::errors::StorageError;
use crate::core::event::Event;
use crate::core::ports::StreamStorage;
use crate::core::stream::{StreamId, Version};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStreamStorage {
    root: PathBuf,
}

struct StreamFile {
    events: Vec<Event>,
    valid_len: u64,
}

impl FileStreamStorage {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stream_path(&self, stream: &StreamId) -> PathBuf {
        self.root
            .join(encode_segment(stream.aggregate_type().as_str()))
            .join(format!("{}.jsonl", stream.aggregate_id()))
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| StorageError::Join(e.to_string()))?
    }
}

/// Percent-encode anything outside `[A-Za-z0-9_-]` so a type tag maps to exactly one directory.
fn encode_segment(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn parse_stream(path: &Path, bytes: &[u8]) -> Result<StreamFile, StorageError> {
    let mut events = Vec::new();
    let mut offset = 0;
    while let Some(end) = bytes[offset..].iter().position(|b| *b == b'\n') {
        let line = &bytes[offset..offset + end];
        let batch: Vec<Event> = serde_json::from_slice(line)?;
        events.extend(batch);
        offset += end + 1;
    }
    if offset < bytes.len() {
        tracing::warn!(
            path = %path.display(),
            torn_bytes = bytes.len() - offset,
            "ignoring torn trailing batch"
        );
    }
    Ok(StreamFile {
        events,
        valid_len: offset as u64,
    })
}

fn load_stream(path: &Path) -> Result<StreamFile, StorageError> {
    match fs::read(path) {
        Ok(bytes) => parse_stream(path, &bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(StreamFile {
            events: Vec::new(),
            valid_len: 0,
        }),
        Err(e) => Err(e.into()),
    }
}

fn append_batch(
    path: &Path,
    expected: Version,
    events: Vec<Event>,
) -> Result<Version, StorageError> {
    append_batch_with(path, expected, events, File::sync_data)
}

/// Appends one batch line. If writing or `sync` fails, the file is cut back to
/// its last committed batch before the error is returned.
fn append_batch_with(
    path: &Path,
    expected: Version,
    events: Vec<Event>,
    sync: impl FnOnce(&File) -> io::Result<()>,
) -> Result<Version, StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let current = parse_stream(path, &bytes)?;

    let actual = Version::new(current.events.len() as u64);
    if actual != expected {
        return Err(StorageError::Conflict { expected, actual });
    }
    for (offset, event) in events.iter().enumerate() {
        if event.version() != expected.advance(offset as u64 + 1) {
            return Err(StorageError::Corrupted(format!(
                "batch for {} is not contiguous at v{}",
                path.display(),
                event.version()
            )));
        }
    }

    let mut line = serde_json::to_vec(&events)?;
    line.push(b'\n');

    let written = file
        .set_len(current.valid_len)
        .and_then(|_| file.seek(SeekFrom::Start(current.valid_len)))
        .and_then(|_| file.write_all(&line))
        .and_then(|_| sync(&file));
    if let Err(error) = written {
        if let Err(rollback) = file.set_len(current.valid_len).and_then(|_| file.sync_data()) {
            tracing::error!(
                path = %path.display(),
                %error,
                %rollback,
                "failed to roll back an unfinished batch"
            );
        }
        return Err(error.into());
    }
    // The batch is durable; the lock is released on close either way.
    if let Err(error) = FileExt::unlock(&file) {
        tracing::warn!(path = %path.display(), %error, "failed to unlock stream file");
    }

    Ok(expected.advance(events.len() as u64))
}

#[async_trait::async_trait]
impl StreamStorage for FileStreamStorage {
    async fn read(&self, stream: &StreamId, from: Version) -> Result<Vec<Event>, StorageError> {
        let path = self.stream_path(stream);
        self.blocking(move || {
            let mut file = load_stream(&path)?;
            file.events.retain(|event| event.version() >= from);
            Ok(file.events)
        })
        .await
    }

    async fn current_version(&self, stream: &StreamId) -> Result<Version, StorageError> {
        let path = self.stream_path(stream);
        self.blocking(move || {
            let file = load_stream(&path)?;
            Ok(Version::new(file.events.len() as u64))
        })
        .await
    }

    async fn append(
        &self,
        stream: &StreamId,
        expected: Version,
        events: Vec<Event>,
    ) -> Result<Version, StorageError> {
        let path = self.stream_path(stream);
        self.blocking(move || append_batch(&path, expected, events))
            .await
    }
}
