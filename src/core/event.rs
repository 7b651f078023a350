// Event records as they enter and leave the store.
//
// Structure
// - NewEvent: what a caller submits. The store assigns its version.
// - Event: what the store commits and returns. Immutable, version assigned by the store.
//
// Versioning
// - Only the append engine turns a NewEvent into an Event, through `NewEvent::commit`.

use crate::core::stream::{AggregateId, AggregateType, StreamId, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    stream: StreamId,
    event_type: EventType,
    payload: Option<Json>,
    timestamp: DateTime<Utc>,
    metadata: Map<String, Json>,
    aggregate_version: Option<Version>,
}

impl NewEvent {
    pub fn new(
        aggregate_type: impl Into<AggregateType>,
        aggregate_id: AggregateId,
        event_type: impl Into<EventType>,
    ) -> Self {
        Self {
            stream: StreamId::new(aggregate_type, aggregate_id),
            event_type: event_type.into(),
            payload: None,
            timestamp: Utc::now(),
            metadata: Map::new(),
            aggregate_version: None,
        }
    }

    pub fn with_payload(mut self, payload: Json) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Json) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Version the aggregate gave this event locally. When set, the store
    /// refuses the batch unless it would assign exactly this version.
    pub fn with_aggregate_version(mut self, version: Version) -> Self {
        self.aggregate_version = Some(version);
        self
    }

    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn payload(&self) -> Option<&Json> {
        self.payload.as_ref()
    }

    pub fn aggregate_version(&self) -> Option<Version> {
        self.aggregate_version
    }

    pub(crate) fn commit(self, version: Version) -> Event {
        Event {
            aggregate_type: self.stream.aggregate_type().clone(),
            aggregate_id: self.stream.aggregate_id(),
            event_type: self.event_type,
            version,
            payload: self.payload,
            timestamp: self.timestamp,
            metadata: self.metadata,
        }
    }
}

/// A committed event. Fields are only readable; the store never hands out a way to change one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    aggregate_type: AggregateType,
    aggregate_id: AggregateId,
    event_type: EventType,
    version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Json>,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Json>,
}

impl Event {
    pub fn aggregate_type(&self) -> &AggregateType {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn stream(&self) -> StreamId {
        StreamId::new(self.aggregate_type.clone(), self.aggregate_id)
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn payload(&self) -> Option<&Json> {
        self.payload.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &Map<String, Json> {
        &self.metadata
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({}, v{})",
            self.aggregate_type, self.event_type, self.aggregate_id, self.version
        )
    }
}
