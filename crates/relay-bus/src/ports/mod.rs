//! Ports (hexagonal architecture).

pub mod inbound;
pub mod outbound;

pub use inbound::{EventBusApi, ReplaySummary};
pub use outbound::{EventHandler, EventStore, TimeSource};
