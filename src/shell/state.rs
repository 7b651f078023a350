use crate::adapters::file::file_stream_storage::FileStreamStorage;
use crate::adapters::in_memory::in_memory_stream_storage::InMemoryStreamStorage;
use crate::application::event_store::{EventStore, OptimisticEventStore};
use crate::core::context::Context;
use crate::core::errors::StorageError;
use crate::shell::config::{Backend, Config};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub event_store: Arc<dyn EventStore>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(event_store: Arc<dyn EventStore>, request_timeout: Duration) -> Self {
        Self {
            event_store,
            request_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        let event_store: Arc<dyn EventStore> = match config.backend {
            Backend::Memory => Arc::new(OptimisticEventStore::new(Arc::new(
                InMemoryStreamStorage::new(),
            ))),
            Backend::File => Arc::new(OptimisticEventStore::new(Arc::new(
                FileStreamStorage::open(&config.data_dir)?,
            ))),
        };
        Ok(Self::new(event_store, config.request_timeout))
    }

    /// Context for one request, bounded by the configured timeout.
    pub fn request_context(&self) -> Context {
        Context::background().with_timeout(self.request_timeout)
    }
}
