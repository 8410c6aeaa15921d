//! # Payload Schemas
//!
//! A schema is declared per event type and checked at publish time, so a
//! malformed payload is rejected before it reaches the log or any handler.

use serde_json::Value;
use std::collections::BTreeMap;

/// JSON kind accepted for a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Any,
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Null => value.is_null(),
            Self::Bool => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Field-level description of an event payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadSchema {
    required: BTreeMap<String, ValueKind>,
    optional: BTreeMap<String, ValueKind>,
    deny_unknown_fields: bool,
}

impl PayloadSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to be present with the given kind.
    #[must_use]
    pub fn require(mut self, field: impl Into<String>, kind: ValueKind) -> Self {
        self.required.insert(field.into(), kind);
        self
    }

    /// Allow `field`; when present it must have the given kind.
    #[must_use]
    pub fn optional(mut self, field: impl Into<String>, kind: ValueKind) -> Self {
        self.optional.insert(field.into(), kind);
        self
    }

    /// Reject payload fields that are neither required nor optional.
    #[must_use]
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown_fields = true;
        self
    }

    /// Check `data` against the schema, returning a human-readable reason on
    /// the first violation.
    pub fn validate(&self, data: &Value) -> Result<(), String> {
        let constrained =
            !self.required.is_empty() || !self.optional.is_empty() || self.deny_unknown_fields;
        if !constrained {
            return Ok(());
        }

        let Some(fields) = data.as_object() else {
            if self.required.is_empty() && data.is_null() {
                return Ok(());
            }
            return Err("payload must be a JSON object".to_string());
        };

        for (name, kind) in &self.required {
            match fields.get(name) {
                None => return Err(format!("missing required field `{name}`")),
                Some(value) if !kind.accepts(value) => {
                    return Err(format!("field `{name}` must be {}", kind.name()));
                }
                Some(_) => {}
            }
        }

        for (name, value) in fields {
            if self.required.contains_key(name) {
                continue;
            }
            match self.optional.get(name) {
                Some(kind) if !kind.accepts(value) => {
                    return Err(format!("field `{name}` must be {}", kind.name()));
                }
                Some(_) => {}
                None if self.deny_unknown_fields => {
                    return Err(format!("unknown field `{name}`"));
                }
                None => {}
            }
        }

        Ok(())
    }
}
