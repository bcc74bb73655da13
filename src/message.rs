//! Message context for a single mediation.
//!
//! Holds the SOAP envelope being mediated, the raw JSON payload when the
//! transport delivered one, and string properties that dynamic registry keys
//! are evaluated against.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::envelope::SoapEnvelope;

/// Context for one message flowing through the mediator.
///
/// Owned by exactly one flow at a time; the mediator borrows it mutably for
/// the duration of a call.
#[derive(Debug, Clone)]
pub struct MessageContext {
    message_id: Uuid,
    envelope: SoapEnvelope,
    json_payload: Option<Vec<u8>>,
    properties: HashMap<String, String>,
    received_at: DateTime<Utc>,
}

impl MessageContext {
    /// Create a context around an envelope.
    ///
    /// # Example
    /// ```
    /// use datamapper_mediator::envelope::{SoapEnvelope, SoapVersion};
    /// use datamapper_mediator::MessageContext;
    ///
    /// let ctx = MessageContext::new(SoapEnvelope::new(SoapVersion::Soap11));
    /// assert!(!ctx.has_json_payload());
    /// ```
    pub fn new(envelope: SoapEnvelope) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            envelope,
            json_payload: None,
            properties: HashMap::new(),
            received_at: Utc::now(),
        }
    }

    /// Attach a raw JSON payload as delivered by the transport.
    pub fn with_json_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.json_payload = Some(payload.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn envelope(&self) -> &SoapEnvelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut SoapEnvelope {
        &mut self.envelope
    }

    /// Replace the envelope wholesale.
    pub fn set_envelope(&mut self, envelope: SoapEnvelope) {
        self.envelope = envelope;
    }

    /// Whether the transport delivered a raw JSON payload.
    pub fn has_json_payload(&self) -> bool {
        self.json_payload.is_some()
    }

    /// Raw JSON payload bytes, if any.
    pub fn json_payload(&self) -> Option<&[u8]> {
        self.json_payload.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }
}
