// Shared test fixtures for streams and events.
// Compiled into the crate only during tests (cfg(test) in src/lib.rs).

use crate::core::event::{Event, NewEvent};
use crate::core::stream::{AggregateId, StreamId, Version};
use serde_json::json;

pub const ORDER: &str = "Order";
pub const ORDER_PLACED: &str = "OrderPlaced";
pub const ORDER_SHIPPED: &str = "OrderShipped";

pub fn order_id() -> AggregateId {
    "c1138e5f-f6fb-4dd0-8e79-255c6c8d3756".parse().unwrap()
}

pub fn other_order_id() -> AggregateId {
    "c1138e5e-f6fb-4dd0-8e79-255c6c8d3756".parse().unwrap()
}

pub fn order_stream() -> StreamId {
    StreamId::new(ORDER, order_id())
}

/// A versionless event for `stream` with a payload naming it.
pub fn new_order_event(stream: &StreamId, name: &str) -> NewEvent {
    NewEvent::new(
        stream.aggregate_type().clone(),
        stream.aggregate_id(),
        ORDER_PLACED,
    )
    .with_payload(json!({ "name": name }))
}

pub fn new_order_events(stream: &StreamId, names: &[&str]) -> Vec<NewEvent> {
    names
        .iter()
        .map(|name| new_order_event(stream, name))
        .collect()
}

/// `count` committed events continuing a stream that currently sits at `after`.
pub fn order_events(stream: &StreamId, after: Version, count: u64) -> Vec<Event> {
    (1..=count)
        .map(|offset| {
            new_order_event(stream, &format!("event{}", after.value() + offset))
                .commit(after.advance(offset))
        })
        .collect()
}
