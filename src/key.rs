//! Registry keys that may be static locations or evaluated per message.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::message::MessageContext;

static DYNAMIC_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\{\s*(?:\$ctx:([A-Za-z0-9_.\-]+)|get-property\(\s*'([^']+)'\s*\))\s*\}$"#)
        .expect("dynamic key pattern is valid")
});

/// A registry location, either fixed or read from a message property.
///
/// Dynamic keys are written `{$ctx:name}` or `{get-property('name')}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegistryKey {
    Static(String),
    Dynamic { property: String },
}

impl RegistryKey {
    /// Parse a key as written in configuration.
    pub fn parse(raw: &str) -> Self {
        match DYNAMIC_KEY.captures(raw.trim()) {
            Some(caps) => {
                let property = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                RegistryKey::Dynamic { property }
            }
            None => RegistryKey::Static(raw.to_string()),
        }
    }

    /// Resolve the key for a message. A dynamic key whose property is unset
    /// evaluates to the empty string.
    pub fn evaluate(&self, ctx: &MessageContext) -> String {
        match self {
            RegistryKey::Static(key) => key.clone(),
            RegistryKey::Dynamic { property } => {
                ctx.property(property).unwrap_or_default().to_string()
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, RegistryKey::Dynamic { .. })
    }
}

impl Default for RegistryKey {
    fn default() -> Self {
        RegistryKey::Static(String::new())
    }
}

impl From<String> for RegistryKey {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for RegistryKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<RegistryKey> for String {
    fn from(key: RegistryKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKey::Static(key) => f.write_str(key),
            RegistryKey::Dynamic { property } => write!(f, "{{$ctx:{}}}", property),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{SoapEnvelope, SoapVersion};

    fn ctx() -> MessageContext {
        MessageContext::new(SoapEnvelope::new(SoapVersion::Soap11))
            .with_property("mapping", "gov:datamapper/order.dmc")
    }

    #[test]
    fn test_static_key() {
        let key = RegistryKey::parse("conf:datamapper/order.dmc");
        assert!(!key.is_dynamic());
        assert_eq!(key.evaluate(&ctx()), "conf:datamapper/order.dmc");
    }

    #[test]
    fn test_ctx_expression() {
        let key = RegistryKey::parse("{$ctx:mapping}");
        assert_eq!(
            key,
            RegistryKey::Dynamic {
                property: "mapping".to_string()
            }
        );
        assert_eq!(key.evaluate(&ctx()), "gov:datamapper/order.dmc");
    }

    #[test]
    fn test_get_property_expression() {
        let key = RegistryKey::parse("{get-property('mapping')}");
        assert_eq!(key.evaluate(&ctx()), "gov:datamapper/order.dmc");
    }

    #[test]
    fn test_missing_property_evaluates_empty() {
        let key = RegistryKey::parse("{$ctx:absent}");
        assert_eq!(key.evaluate(&ctx()), "");
    }

    #[test]
    fn test_serde_round_trips_through_string() {
        let key: RegistryKey = serde_json::from_str("\"{$ctx:mapping}\"").unwrap();
        assert!(key.is_dynamic());
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"{$ctx:mapping}\"");
    }
}
