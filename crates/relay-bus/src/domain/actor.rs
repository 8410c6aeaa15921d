//! Pre-validated caller identity.
//!
//! The bus performs no authentication. Callers that have already
//! authenticated a principal pass it in as an `ActorContext`; the bus uses it
//! to stamp tenant and user metadata and to attribute administrative
//! operations in the logs.

use crate::domain::event::Event;
use serde::{Deserialize, Serialize};

/// Identity of the principal performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: String,
    pub tenant_id: Option<String>,
}

impl ActorContext {
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            tenant_id: None,
        }
    }

    /// Internal identity used for bus-initiated operations.
    #[must_use]
    pub fn system() -> Self {
        Self::new("system")
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Fill the event's tenant and user from this actor where absent.
    /// Values supplied by the producer win.
    #[must_use]
    pub fn stamp(&self, mut event: Event) -> Event {
        if event.metadata.tenant_id.is_none() {
            event.metadata.tenant_id = self.tenant_id.clone();
        }
        if event.metadata.user_id.is_none() {
            event.metadata.user_id = Some(self.actor_id.clone());
        }
        event
    }
}
