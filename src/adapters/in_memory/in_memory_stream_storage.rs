// In memory implementation of the StreamStorage port.
//
// Purpose
// - Support store tests and local development without a durable medium.
//
// Responsibilities
// - Store events per stream in memory, one lock per stream so streams never contend.
// - Enforce optimistic concurrency by checking the expected version on append.
// - Offer test hooks to simulate an offline backend and a slow append.

use crate::core::errors::StorageError;
use crate::core::event::Event;
use crate::core::ports::StreamStorage;
use crate::core::stream::{StreamId, Version};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

type StreamSlot = Arc<RwLock<Vec<Event>>>;

#[derive(Default)]
pub struct InMemoryStreamStorage {
    streams: DashMap<StreamId, StreamSlot>,
    is_offline: bool,
    delay_append_ms: AtomicU64,
}

impl InMemoryStreamStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.is_offline = !self.is_offline;
    }

    /// Sleep this long inside every append, before the version comparison.
    pub fn set_delay_append_ms(&self, delay_ms: u64) {
        self.delay_append_ms.store(delay_ms, Ordering::Relaxed);
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn ensure_online(&self) -> Result<(), StorageError> {
        if self.is_offline {
            return Err(StorageError::Backend("Stream storage offline".into()));
        }
        Ok(())
    }

    fn slot(&self, stream: &StreamId) -> Option<StreamSlot> {
        self.streams.get(stream).map(|slot| Arc::clone(slot.value()))
    }
}

#[async_trait::async_trait]
impl StreamStorage for InMemoryStreamStorage {
    async fn read(&self, stream: &StreamId, from: Version) -> Result<Vec<Event>, StorageError> {
        self.ensure_online()?;
        let Some(slot) = self.slot(stream) else {
            return Ok(Vec::new());
        };
        let guard = slot.read().await;
        Ok(guard
            .iter()
            .filter(|event| event.version() >= from)
            .cloned()
            .collect())
    }

    async fn current_version(&self, stream: &StreamId) -> Result<Version, StorageError> {
        self.ensure_online()?;
        match self.slot(stream) {
            Some(slot) => Ok(Version::new(slot.read().await.len() as u64)),
            None => Ok(Version::INITIAL),
        }
    }

    async fn append(
        &self,
        stream: &StreamId,
        expected: Version,
        events: Vec<Event>,
    ) -> Result<Version, StorageError> {
        self.ensure_online()?;

        let delay = self.delay_append_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        for (offset, event) in events.iter().enumerate() {
            if event.version() != expected.advance(offset as u64 + 1) {
                return Err(StorageError::Corrupted(format!(
                    "batch for {stream} is not contiguous at v{}",
                    event.version()
                )));
            }
        }

        let slot = match self.slot(stream) {
            Some(slot) => slot,
            None if expected == Version::INITIAL => Arc::clone(
                self.streams
                    .entry(stream.clone())
                    .or_insert_with(StreamSlot::default)
                    .value(),
            ),
            None => {
                return Err(StorageError::Conflict {
                    expected,
                    actual: Version::INITIAL,
                });
            }
        };

        let mut guard = slot.write().await;
        let actual = Version::new(guard.len() as u64);
        if actual != expected {
            return Err(StorageError::Conflict { expected, actual });
        }
        guard.extend(events);
        Ok(Version::new(guard.len() as u64))
    }
}

#[cfg(test)]
mod in_memory_stream_storage_tests {
    use super::*;
    use crate::tests::fixtures::events::{order_stream, order_events};
    use rstest::{fixture, rstest};

    #[fixture]
    fn before_each() -> (StreamId, InMemoryStreamStorage) {
        (order_stream(), InMemoryStreamStorage::new())
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_append_and_read_a_batch(before_each: (StreamId, InMemoryStreamStorage)) {
        let (stream, storage) = before_each;
        let events = order_events(&stream, Version::INITIAL, 3);
        let version = storage
            .append(&stream, Version::INITIAL, events.clone())
            .await
            .expect("expected to append to the storage");
        assert_eq!(version, Version::new(3));
        let read = storage
            .read(&stream, Version::INITIAL)
            .await
            .expect("expected to read from the storage");
        assert_eq!(read, events);
        assert_eq!(
            storage.current_version(&stream).await.unwrap(),
            Version::new(3)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_read_from_a_version(before_each: (StreamId, InMemoryStreamStorage)) {
        let (stream, storage) = before_each;
        storage
            .append(
                &stream,
                Version::INITIAL,
                order_events(&stream, Version::INITIAL, 4),
            )
            .await
            .unwrap();
        let read = storage.read(&stream, Version::new(3)).await.unwrap();
        let versions: Vec<u64> = read.iter().map(|e| e.version().value()).collect();
        assert_eq!(versions, vec![3, 4]);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_return_nothing_for_an_unknown_stream(
        before_each: (StreamId, InMemoryStreamStorage),
    ) {
        let (stream, storage) = before_each;
        assert!(storage.read(&stream, Version::INITIAL).await.unwrap().is_empty());
        assert_eq!(
            storage.current_version(&stream).await.unwrap(),
            Version::INITIAL
        );
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_to_append_if_the_wrong_version_is_expected(
        before_each: (StreamId, InMemoryStreamStorage),
    ) {
        let (stream, storage) = before_each;
        let result = storage
            .append(
                &stream,
                Version::new(1),
                order_events(&stream, Version::new(1), 1),
            )
            .await;
        match result {
            Err(StorageError::Conflict { expected, actual }) => {
                assert_eq!(expected, Version::new(1));
                assert_eq!(actual, Version::INITIAL);
            }
            other => panic!("expected Conflict error, got {other:?}"),
        }
        assert_eq!(storage.stream_count(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_reject_a_batch_with_a_gap(before_each: (StreamId, InMemoryStreamStorage)) {
        let (stream, storage) = before_each;
        let result = storage
            .append(
                &stream,
                Version::INITIAL,
                order_events(&stream, Version::new(1), 1),
            )
            .await;
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
        assert!(storage.read(&stream, Version::INITIAL).await.unwrap().is_empty());
        assert_eq!(storage.stream_count(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_if_the_storage_is_offline(
        before_each: (StreamId, InMemoryStreamStorage),
    ) {
        let (stream, mut storage) = before_each;
        storage.toggle_offline();
        let result = storage.read(&stream, Version::INITIAL).await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Stream storage offline")
        );
        let append = storage
            .append(
                &stream,
                Version::INITIAL,
                order_events(&stream, Version::INITIAL, 1),
            )
            .await;
        assert!(matches!(append, Err(StorageError::Backend(_))));
    }
}
