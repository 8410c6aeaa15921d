//! # Typed Events
//!
//! Binds a Rust payload type to an event type tag so producers and
//! subscribers can exchange structs instead of raw JSON.
//!
//! ```text
//! publish_typed(T) ──serialize──► Event { event_type: T::EVENT_TYPE, data }
//! Event ──deserialize──► TypedEnvelope<T> ──► subscriber closure
//! ```

use crate::domain::errors::ValidationError;
use crate::domain::event::{Event, EventType};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A payload type with a fixed event type tag.
pub trait TypedEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Tag used for routing.
    const EVENT_TYPE: &'static str;

    #[must_use]
    fn event_type() -> EventType {
        EventType::new(Self::EVENT_TYPE)
    }
}

/// An event together with its decoded payload.
#[derive(Debug, Clone)]
pub struct TypedEnvelope<T> {
    pub event: Event,
    pub payload: T,
}

impl<T: TypedEvent> TypedEnvelope<T> {
    /// Decode the payload of `event`.
    ///
    /// # Errors
    ///
    /// Fails when the payload does not deserialize into `T`.
    pub fn decode(event: Event) -> Result<Self, serde_json::Error> {
        let payload = serde_json::from_value(event.data.clone())?;
        Ok(Self { event, payload })
    }
}

impl Event {
    /// Build an event whose type and payload come from a typed value.
    ///
    /// # Errors
    ///
    /// - `ValidationError::Encoding` - payload could not be serialized
    pub fn typed<T: TypedEvent>(
        source: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ValidationError> {
        let data =
            serde_json::to_value(payload).map_err(|e| ValidationError::Encoding(e.to_string()))?;
        Ok(Self::new(T::event_type(), source).with_data(data))
    }
}
