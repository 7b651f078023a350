// Query engine: reads committed streams back in version order.
//
// Responsibilities
// - Return the whole stream, or the tail from a given version.
// - Treat an unknown stream as empty, not as an error.
// - Verify that what storage returned is contiguous before handing it out.
//
// Boundaries
// - Never takes the per-stream write lock.

use crate::core::context::Context;
use crate::core::errors::{EventStoreError, StorageError};
use crate::core::event::Event;
use crate::core::ports::StreamStorage;
use crate::core::stream::{StreamId, Version};
use std::sync::Arc;

pub struct QueryEngine<S>
where
    S: StreamStorage + ?Sized,
{
    storage: Arc<S>,
}

impl<S> QueryEngine<S>
where
    S: StreamStorage + ?Sized,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn load(
        &self,
        ctx: &Context,
        stream: &StreamId,
    ) -> Result<Vec<Event>, EventStoreError> {
        self.load_from(ctx, stream, Version::new(1)).await
    }

    pub async fn load_from(
        &self,
        ctx: &Context,
        stream: &StreamId,
        from: Version,
    ) -> Result<Vec<Event>, EventStoreError> {
        let from = from.max(Version::new(1));
        let events = ctx
            .run(async {
                self.storage
                    .read(stream, from)
                    .await
                    .map_err(|source| EventStoreError::from_storage(stream, source))
            })
            .await?;
        verify_sequence(stream, from, &events)?;
        tracing::debug!(%stream, %from, count = events.len(), "loaded stream");
        Ok(events)
    }

    pub async fn version(
        &self,
        ctx: &Context,
        stream: &StreamId,
    ) -> Result<Version, EventStoreError> {
        ctx.run(async {
            self.storage
                .current_version(stream)
                .await
                .map_err(|source| EventStoreError::from_storage(stream, source))
        })
        .await
    }
}

fn verify_sequence(
    stream: &StreamId,
    from: Version,
    events: &[Event],
) -> Result<(), EventStoreError> {
    let mut next = from;
    for event in events {
        if event.version() != next || &event.stream() != stream {
            return Err(EventStoreError::Storage {
                stream: stream.clone(),
                source: StorageError::Corrupted(format!(
                    "expected v{next} of {stream}, found {event}"
                )),
            });
        }
        next = next.next();
    }
    Ok(())
}

#[cfg(test)]
mod query_engine_tests {
    use super::*;
    use crate::adapters::in_memory::in_memory_stream_storage::InMemoryStreamStorage;
    use crate::core::errors::{CancelReason, ErrorKind};
    use crate::tests::fixtures::events::{order_events, order_stream, other_order_id};
    use async_trait::async_trait;
    use rstest::{fixture, rstest};

    type BeforeEachReturn = (StreamId, Arc<InMemoryStreamStorage>);

    #[fixture]
    fn before_each() -> BeforeEachReturn {
        (order_stream(), Arc::new(InMemoryStreamStorage::new()))
    }

    /// Storage that hands back a fixed, possibly broken, sequence.
    struct ScriptedStorage(Vec<Event>);

    #[async_trait]
    impl StreamStorage for ScriptedStorage {
        async fn read(&self, _: &StreamId, _: Version) -> Result<Vec<Event>, StorageError> {
            Ok(self.0.clone())
        }
        async fn current_version(&self, _: &StreamId) -> Result<Version, StorageError> {
            Ok(Version::new(self.0.len() as u64))
        }
        async fn append(
            &self,
            _: &StreamId,
            _: Version,
            _: Vec<Event>,
        ) -> Result<Version, StorageError> {
            Err(StorageError::Backend("read only".into()))
        }
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_load_an_empty_stream_without_error(before_each: BeforeEachReturn) {
        let (stream, storage) = before_each;
        let engine = QueryEngine::new(storage);
        let ctx = Context::background();
        assert!(engine.load(&ctx, &stream).await.unwrap().is_empty());
        assert_eq!(engine.version(&ctx, &stream).await.unwrap(), Version::INITIAL);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_load_the_stream_in_version_order(before_each: BeforeEachReturn) {
        let (stream, storage) = before_each;
        let events = order_events(&stream, Version::INITIAL, 3);
        storage
            .append(&stream, Version::INITIAL, events.clone())
            .await
            .unwrap();
        let engine = QueryEngine::new(storage);
        let ctx = Context::background();
        assert_eq!(engine.load(&ctx, &stream).await.unwrap(), events);
        assert_eq!(
            engine.load_from(&ctx, &stream, Version::new(2)).await.unwrap(),
            events[1..].to_vec()
        );
        assert_eq!(
            engine.load_from(&ctx, &stream, Version::INITIAL).await.unwrap(),
            events
        );
        assert_eq!(engine.version(&ctx, &stream).await.unwrap(), Version::new(3));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_flag_a_gap_returned_by_storage() {
        let stream = order_stream();
        let mut events = order_events(&stream, Version::INITIAL, 3);
        events.remove(1);
        let engine = QueryEngine::new(Arc::new(ScriptedStorage(events)));
        let result = engine.load(&Context::background(), &stream).await;
        assert!(matches!(
            result,
            Err(EventStoreError::Storage {
                source: StorageError::Corrupted(_),
                ..
            })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_flag_events_from_another_stream() {
        let stream = order_stream();
        let other = StreamId::new("Order", other_order_id());
        let engine = QueryEngine::new(Arc::new(ScriptedStorage(order_events(
            &other,
            Version::INITIAL,
            1,
        ))));
        let result = engine.load(&Context::background(), &stream).await;
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Storage));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_honor_an_expired_deadline(before_each: BeforeEachReturn) {
        let (stream, storage) = before_each;
        let engine = QueryEngine::new(storage);
        let ctx = Context::background().with_deadline(tokio::time::Instant::now());
        let result = engine.load(&ctx, &stream).await;
        assert!(matches!(
            result,
            Err(EventStoreError::Cancelled {
                reason: CancelReason::DeadlineExceeded
            })
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_fail_if_the_storage_is_offline(before_each: BeforeEachReturn) {
        let (stream, _) = before_each;
        let mut storage = InMemoryStreamStorage::new();
        storage.toggle_offline();
        let engine = QueryEngine::new(Arc::new(storage));
        let result = engine.load(&Context::background(), &stream).await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Stream storage offline")
        );
    }
}
