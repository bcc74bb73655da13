//! The data mapper mediator: one configured transformation step.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::MediatorConfig;
use crate::engine::{AdapterRegistry, FieldMappingEngine};
use crate::error::MediationError;
use crate::key::RegistryKey;
use crate::message::MessageContext;
use crate::orchestrator::{TransformKeys, TransformOrchestrator};
use crate::resources::{
    FileSystemRegistry, RegistryResourceResolver, ResourceBundle, ResourceCache, ResourceKey,
};

/// Holds the registry keys and type tokens of one mediator and runs the
/// shared [`TransformOrchestrator`] for each message.
///
/// The identity is fixed for the mediator's lifetime and scopes its entries
/// in the resource cache.
pub struct DataMapperMediator {
    config_key: RegistryKey,
    input_schema_key: RegistryKey,
    output_schema_key: RegistryKey,
    input_type: String,
    output_type: String,
    id: Uuid,
    orchestrator: Arc<TransformOrchestrator>,
}

impl DataMapperMediator {
    pub fn new(
        config_key: impl Into<RegistryKey>,
        input_schema_key: impl Into<RegistryKey>,
        output_schema_key: impl Into<RegistryKey>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
        orchestrator: Arc<TransformOrchestrator>,
    ) -> Self {
        Self {
            config_key: config_key.into(),
            input_schema_key: input_schema_key.into(),
            output_schema_key: output_schema_key.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
            id: Uuid::new_v4(),
            orchestrator,
        }
    }

    /// Use a fixed identity instead of the generated one.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Build a mediator and its own orchestrator from configuration, using
    /// the filesystem registry and the built-in readers, writers and
    /// field-mapping engine.
    pub fn from_config(config: &MediatorConfig) -> Self {
        let registry = Arc::new(FileSystemRegistry::new(
            &config.registry.config_root,
            &config.registry.governance_root,
        ));
        let cache = Arc::new(ResourceCache::new(Arc::new(RegistryResourceResolver::new(
            registry,
        ))));
        let orchestrator = Arc::new(TransformOrchestrator::new(
            cache,
            Arc::new(AdapterRegistry::with_defaults()),
            Arc::new(FieldMappingEngine),
        ));

        Self::with_orchestrator(config, orchestrator)
    }

    /// Build a mediator from configuration around an existing orchestrator.
    pub fn with_orchestrator(config: &MediatorConfig, orchestrator: Arc<TransformOrchestrator>) -> Self {
        let settings = &config.mediator;
        let mediator = Self::new(
            settings.config_key.clone(),
            settings.input_schema_key.clone(),
            settings.output_schema_key.clone(),
            settings.input_type.clone(),
            settings.output_type.clone(),
            orchestrator,
        );
        match settings.id {
            Some(id) => mediator.with_id(id),
            None => mediator,
        }
    }

    /// Transform the message in place.
    ///
    /// Dynamic keys are evaluated against the message properties first. On
    /// error the message is left as it was.
    pub fn mediate(&self, ctx: &mut MessageContext) -> Result<(), MediationError> {
        tracing::debug!(message_id = %ctx.message_id(), "Start : DataMapper mediator");
        tracing::trace!(envelope = %ctx.envelope(), "Message : ");

        let config_key = self.config_key.evaluate(ctx);
        let input_schema_key = self.input_schema_key.evaluate(ctx);
        let output_schema_key = self.output_schema_key.evaluate(ctx);
        let identity = self.id.to_string();

        let keys = TransformKeys {
            config_key: &config_key,
            input_schema_key: &input_schema_key,
            output_schema_key: &output_schema_key,
            input_type: &self.input_type,
            output_type: &self.output_type,
            identity: &identity,
        };

        if let Err(e) = self.orchestrator.orchestrate(ctx, keys) {
            tracing::warn!(message_id = %ctx.message_id(), error = %e, "DataMapper mediation failed");
            return Err(e);
        }

        tracing::trace!(envelope = %ctx.envelope(), "Message : ");
        tracing::debug!(message_id = %ctx.message_id(), "End : DataMapper mediator");
        Ok(())
    }

    /// Resolve the mediator's resources ahead of the first message.
    ///
    /// Only possible when all three keys are static; returns `Ok(None)` when
    /// any key is dynamic.
    pub fn preload_resources(&self) -> Result<Option<Arc<ResourceBundle>>, MediationError> {
        let statics = [
            &self.config_key,
            &self.input_schema_key,
            &self.output_schema_key,
        ];
        let mut locations = Vec::with_capacity(statics.len());
        for key in statics {
            match key {
                RegistryKey::Static(location) => locations.push(location.as_str()),
                RegistryKey::Dynamic { .. } => return Ok(None),
            }
        }

        let empty_keys: Vec<&'static str> = ["config_key", "input_schema_key", "output_schema_key"]
            .into_iter()
            .zip(&locations)
            .filter(|(_, location)| location.is_empty())
            .map(|(name, _)| name)
            .collect();
        if !empty_keys.is_empty() {
            return Err(MediationError::ConfigurationInvalid { empty_keys });
        }

        let key = ResourceKey::new(
            self.id.to_string(),
            locations[0],
            locations[1],
            locations[2],
        );
        Ok(Some(self.orchestrator.cache().get_or_resolve(&key)?))
    }

    pub fn unique_id(&self) -> Uuid {
        self.id
    }

    /// The mediator reads and rewrites the message body.
    pub fn is_content_aware(&self) -> bool {
        true
    }

    pub fn input_type(&self) -> &str {
        &self.input_type
    }

    pub fn output_type(&self) -> &str {
        &self.output_type
    }
}
