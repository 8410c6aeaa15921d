//! Adapters implementing the outbound ports.

pub mod handler;
pub mod store;
pub mod time;

pub use handler::{handler_fn, FnHandler, TypedHandler};
pub use store::InMemoryEventStore;
pub use time::{ManualTimeSource, SystemTimeSource};
