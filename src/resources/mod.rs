//! Mapping resources: the mapping configuration plus input and output
//! schemas, fetched from a registry and memoized per key tuple.

pub mod cache;
pub mod registry;
pub mod schema;

use std::sync::Arc;

pub use cache::ResourceCache;
pub use registry::{FileSystemRegistry, InMemoryRegistry, ResourceRegistry};
pub use schema::{FieldMapping, FieldTransform, MappingConfig, Schema, SchemaField};

/// Errors raised while fetching or parsing mapping resources.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Resource not found in registry: {0}")]
    NotFound(String),

    #[error("Unsupported registry location: {0}")]
    UnsupportedLocation(String),

    #[error("Failed to read resource {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema at {location}: {source}")]
    InvalidSchema {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid mapping configuration at {location}: {source}")]
    InvalidMappingConfig {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Cache key: the three registry locations plus the identity of the
/// mediator instance asking for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub identity: String,
    pub config_key: String,
    pub input_schema_key: String,
    pub output_schema_key: String,
}

impl ResourceKey {
    pub fn new(
        identity: impl Into<String>,
        config_key: impl Into<String>,
        input_schema_key: impl Into<String>,
        output_schema_key: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            config_key: config_key.into(),
            input_schema_key: input_schema_key.into(),
            output_schema_key: output_schema_key.into(),
        }
    }
}

/// Resolved resources for one mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceBundle {
    pub config: MappingConfig,
    pub input_schema: Schema,
    pub output_schema: Schema,
}

/// Produces a [`ResourceBundle`] for a key. Implementations are called at
/// most once per key by [`ResourceCache`].
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, key: &ResourceKey) -> Result<ResourceBundle, ResourceError>;
}

/// Resolver that reads and parses the three documents from a registry.
pub struct RegistryResourceResolver {
    registry: Arc<dyn ResourceRegistry>,
}

impl RegistryResourceResolver {
    pub fn new(registry: Arc<dyn ResourceRegistry>) -> Self {
        Self { registry }
    }

    fn load_schema(&self, location: &str) -> Result<Schema, ResourceError> {
        let content = self.registry.fetch(location)?;
        Schema::from_json(&content).map_err(|source| ResourceError::InvalidSchema {
            location: location.to_string(),
            source,
        })
    }
}

impl ResourceResolver for RegistryResourceResolver {
    fn resolve(&self, key: &ResourceKey) -> Result<ResourceBundle, ResourceError> {
        let content = self.registry.fetch(&key.config_key)?;
        let config =
            MappingConfig::parse(&content).map_err(|source| ResourceError::InvalidMappingConfig {
                location: key.config_key.clone(),
                source,
            })?;

        let input_schema = self.load_schema(&key.input_schema_key)?;
        let output_schema = self.load_schema(&key.output_schema_key)?;

        tracing::info!(
            identity = %key.identity,
            mappings = config.mappings.len(),
            input_schema = %input_schema.name,
            output_schema = %output_schema.name,
            "Loaded mapping resources"
        );

        Ok(ResourceBundle {
            config,
            input_schema,
            output_schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<InMemoryRegistry> {
        Arc::new(
            InMemoryRegistry::new()
                .with_entry("conf:order.dmc", "mappings:\n  - from: id\n    to: ref\n")
                .with_entry("conf:in.json", r#"{"name":"order"}"#)
                .with_entry("conf:out.json", r#"{"name":"invoice"}"#)
                .with_entry("conf:broken.json", "{not json"),
        )
    }

    #[test]
    fn test_resolve_bundle() {
        let resolver = RegistryResourceResolver::new(registry());
        let bundle = resolver
            .resolve(&ResourceKey::new("id", "conf:order.dmc", "conf:in.json", "conf:out.json"))
            .unwrap();

        assert_eq!(bundle.config.mappings.len(), 1);
        assert_eq!(bundle.input_schema.name, "order");
        assert_eq!(bundle.output_schema.name, "invoice");
    }

    #[test]
    fn test_missing_resource() {
        let resolver = RegistryResourceResolver::new(registry());
        let result =
            resolver.resolve(&ResourceKey::new("id", "conf:nope.dmc", "conf:in.json", "conf:out.json"));
        assert!(matches!(result, Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_invalid_schema() {
        let resolver = RegistryResourceResolver::new(registry());
        let result = resolver.resolve(&ResourceKey::new(
            "id",
            "conf:order.dmc",
            "conf:broken.json",
            "conf:out.json",
        ));
        assert!(matches!(result, Err(ResourceError::InvalidSchema { .. })));
    }
}
