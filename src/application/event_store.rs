// Event store facade: the public save and load contract.
//
// Purpose
// - Compose the version gate, append engine and query engine behind one trait.
//
// Responsibilities
// - Derive the target stream of a save from its events.
// - Delegate everything else. The facade keeps no state of its own.

use crate::application::append_engine::AppendEngine;
use crate::application::query_engine::QueryEngine;
use crate::application::version_gate::VersionGate;
use crate::core::context::Context;
use crate::core::errors::EventStoreError;
use crate::core::event::{Event, NewEvent};
use crate::core::ports::StreamStorage;
use crate::core::stream::{AggregateId, AggregateType, StreamId, Version};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append `events` to their aggregate's stream if it is currently at `expected`.
    async fn save(
        &self,
        ctx: &Context,
        events: Vec<NewEvent>,
        expected: Version,
    ) -> Result<Vec<Event>, EventStoreError>;

    /// The full stream in version order. Empty when nothing was ever saved.
    async fn load(
        &self,
        ctx: &Context,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Result<Vec<Event>, EventStoreError>;

    async fn load_from(
        &self,
        ctx: &Context,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
        from: Version,
    ) -> Result<Vec<Event>, EventStoreError>;

    async fn version(
        &self,
        ctx: &Context,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Result<Version, EventStoreError>;
}

pub struct OptimisticEventStore<S>
where
    S: StreamStorage + ?Sized,
{
    appender: AppendEngine<S>,
    queries: QueryEngine<S>,
}

impl<S> OptimisticEventStore<S>
where
    S: StreamStorage + ?Sized,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            appender: AppendEngine::new(storage.clone(), VersionGate::new()),
            queries: QueryEngine::new(storage),
        }
    }
}

#[async_trait]
impl<S> EventStore for OptimisticEventStore<S>
where
    S: StreamStorage + ?Sized + 'static,
{
    #[tracing::instrument(skip_all, fields(count = events.len(), %expected))]
    async fn save(
        &self,
        ctx: &Context,
        events: Vec<NewEvent>,
        expected: Version,
    ) -> Result<Vec<Event>, EventStoreError> {
        let stream = match events.first() {
            Some(first) => first.stream().clone(),
            None => return Err(EventStoreError::NoEventsToAppend),
        };
        self.appender.append(ctx, &stream, events, expected).await
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn load(
        &self,
        ctx: &Context,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Result<Vec<Event>, EventStoreError> {
        let stream = StreamId::new(aggregate_type.clone(), aggregate_id);
        self.queries.load(ctx, &stream).await
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn load_from(
        &self,
        ctx: &Context,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
        from: Version,
    ) -> Result<Vec<Event>, EventStoreError> {
        let stream = StreamId::new(aggregate_type.clone(), aggregate_id);
        self.queries.load_from(ctx, &stream, from).await
    }

    #[tracing::instrument(skip(self, ctx))]
    async fn version(
        &self,
        ctx: &Context,
        aggregate_type: &AggregateType,
        aggregate_id: AggregateId,
    ) -> Result<Version, EventStoreError> {
        let stream = StreamId::new(aggregate_type.clone(), aggregate_id);
        self.queries.version(ctx, &stream).await
    }
}
