// Crate entry point. Re-export modules so tests and binaries can import them easily.
//
// Responsibilities
// - Only declare and expose modules. No storage or concurrency logic here.
//
// How it is used
// - The shell binary and the integration tests import the store from this crate root.

pub mod core {
    pub mod context;
    pub mod errors;
    pub mod event;
    pub mod ports;
    pub mod stream;
}

pub mod application {
    pub mod append_engine;
    pub mod event_store;
    pub mod query_engine;
    pub mod version_gate;
}

pub mod adapters {
    pub mod file {
        pub mod file_stream_storage;
    }
    pub mod in_memory {
        pub mod in_memory_stream_storage;
    }
}

pub mod shell;

pub use crate::application::event_store::{EventStore, OptimisticEventStore};
pub use crate::core::context::{CancelHandle, Context};
pub use crate::core::errors::{CancelReason, ErrorKind, EventStoreError, StorageError};
pub use crate::core::event::{Event, EventType, NewEvent};
pub use crate::core::ports::StreamStorage;
pub use crate::core::stream::{AggregateId, AggregateType, StreamId, Version};

#[cfg(test)]
pub mod tests {
    pub mod fixtures {
        pub mod events;
    }
}
