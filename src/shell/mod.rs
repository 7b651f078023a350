// Composition root for the event store process.
//
// Responsibilities
// - Read config from the environment.
// - Instantiate the configured stream storage and wrap it in the store.
// - Expose save and load over HTTP.

pub mod config;
pub mod http;
pub mod state;
