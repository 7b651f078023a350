// Version gate: the optimistic concurrency check in front of every append.
//
// Purpose
// - Decide whether a writer may append, by comparing its expected version with
//   the stream's current committed version.
//
// Responsibilities
// - Serialize writers per stream identity so the check and the following commit
//   form one step. Writers to different streams never share a lock.
// - Keep the lock table small: an entry lives only while someone holds or waits for it.

use crate::core::errors::EventStoreError;
use crate::core::event::NewEvent;
use crate::core::ports::StreamStorage;
use crate::core::stream::{StreamId, Version};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<StreamId, Arc<Mutex<()>>>;

#[derive(Default, Clone)]
pub struct VersionGate {
    locks: Arc<LockTable>,
}

/// Proof that the gate granted a write. Holds the stream lock until dropped.
pub struct GatePermit {
    stream: StreamId,
    version: Version,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl GatePermit {
    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Committed version observed while holding the lock.
    pub fn version(&self) -> Version {
        self.version
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.stream, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl VersionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(
        stream: &StreamId,
        expected: Version,
        actual: Version,
    ) -> Result<(), EventStoreError> {
        if expected != actual {
            return Err(conflict(stream, expected, actual));
        }
        Ok(())
    }

    /// Events that carry the aggregate's own version must land exactly there.
    /// A mismatch means the aggregate was built from a stale stream.
    pub fn check_positions(
        stream: &StreamId,
        events: &[NewEvent],
        current: Version,
    ) -> Result<(), EventStoreError> {
        for (offset, event) in events.iter().enumerate() {
            let position = offset as u64 + 1;
            match event.aggregate_version() {
                Some(version) if version != current.advance(position) => {
                    // Stamps below their batch position still conflict, reported from 0.
                    let assumed = Version::new(version.value().saturating_sub(position));
                    return Err(conflict(stream, assumed, current));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Lock `stream`, read its current version and grant the write if it equals `expected`.
    pub async fn admit<S>(
        &self,
        storage: &S,
        stream: &StreamId,
        expected: Version,
    ) -> Result<GatePermit, EventStoreError>
    where
        S: StreamStorage + ?Sized,
    {
        let lock = Arc::clone(
            self.locks
                .entry(stream.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let mut permit = GatePermit {
            stream: stream.clone(),
            version: Version::INITIAL,
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.locks),
        };

        let actual = storage
            .current_version(stream)
            .await
            .map_err(|source| EventStoreError::from_storage(stream, source))?;
        Self::check(stream, expected, actual)?;
        permit.version = actual;
        Ok(permit)
    }

    /// Streams with a live lock entry.
    pub fn active_streams(&self) -> usize {
        self.locks.len()
    }
}

fn conflict(stream: &StreamId, expected: Version, actual: Version) -> EventStoreError {
    tracing::warn!(%stream, %expected, %actual, "version conflict");
    EventStoreError::VersionConflict {
        stream: stream.clone(),
        expected,
        actual,
    }
}
