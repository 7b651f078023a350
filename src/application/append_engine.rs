// Append engine: turns a batch of new events into committed events.
//
// Responsibilities
// - Reject empty batches and batches that span more than one stream.
// - Pass the version gate, assign contiguous versions in input order,
//   and commit the whole batch through one conditional storage append.
//
// Cancellation
// - Honored up to the commit. The commit itself is not raced against the
//   context, so a batch is never reported cancelled after becoming visible.

use crate::application::version_gate::VersionGate;
use crate::core::context::Context;
use crate::core::errors::EventStoreError;
use crate::core::event::{Event, NewEvent};
use crate::core::ports::StreamStorage;
use crate::core::stream::{StreamId, Version};
use std::sync::Arc;

pub struct AppendEngine<S>
where
    S: StreamStorage + ?Sized,
{
    storage: Arc<S>,
    gate: VersionGate,
}

impl<S> AppendEngine<S>
where
    S: StreamStorage + ?Sized,
{
    pub fn new(storage: Arc<S>, gate: VersionGate) -> Self {
        Self { storage, gate }
    }

    pub async fn append(
        &self,
        ctx: &Context,
        stream: &StreamId,
        events: Vec<NewEvent>,
        expected: Version,
    ) -> Result<Vec<Event>, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::NoEventsToAppend);
        }
        if let Some(stray) = events.iter().find(|event| event.stream() != stream) {
            return Err(EventStoreError::MismatchedAggregate {
                expected: stream.clone(),
                found: stray.stream().clone(),
            });
        }

        let permit = ctx
            .run(self.gate.admit(&*self.storage, stream, expected))
            .await?;
        VersionGate::check_positions(stream, &events, permit.version())?;
        ctx.check()?;

        let committed = assign_versions(events, permit.version());
        let count = committed.len();
        let version = self
            .storage
            .append(stream, expected, committed.clone())
            .await
            .map_err(|source| EventStoreError::from_storage(stream, source))?;
        drop(permit);

        tracing::debug!(%stream, %expected, %version, count, "committed batch");
        Ok(committed)
    }
}

/// Number the batch `from+1, from+2, ...` without reordering it.
pub fn assign_versions(events: Vec<NewEvent>, from: Version) -> Vec<Event> {
    events
        .into_iter()
        .enumerate()
        .map(|(offset, event)| event.commit(from.advance(offset as u64 + 1)))
        .collect()
}
