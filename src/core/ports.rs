// Ports define what the store needs from the durable medium, without implementing it.
//
// Purpose
// - Describe stream storage as a trait so in memory, file backed and networked
//   backends satisfy one append and query contract.
//
// Responsibilities of an implementation
// - Keep events per stream in commit order.
// - Make a batch visible atomically: a reader sees all of it or none of it.
// - Reject an append whose expected version is not the current version
//   with StorageError::Conflict, even if the caller already checked.
//
// Boundaries
// - Only the version gate and append engine write through this port.

use crate::core::errors::StorageError;
use crate::core::event::Event;
use crate::core::stream::{StreamId, Version};
use async_trait::async_trait;

#[async_trait]
pub trait StreamStorage: Send + Sync {
    /// Committed events of `stream` with `version >= from`, ascending. Unknown streams are empty.
    async fn read(&self, stream: &StreamId, from: Version) -> Result<Vec<Event>, StorageError>;

    /// Highest committed version, `Version::INITIAL` for an unknown stream.
    async fn current_version(&self, stream: &StreamId) -> Result<Version, StorageError>;

    /// Compare-and-append. Returns the stream version after the batch.
    async fn append(
        &self,
        stream: &StreamId,
        expected: Version,
        events: Vec<Event>,
    ) -> Result<Version, StorageError>;
}
