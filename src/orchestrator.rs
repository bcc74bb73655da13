//! Transform orchestration and output reconciliation.
//!
//! One [`TransformOrchestrator`] is shared by every mediation. A call runs a
//! linear pipeline over the message:
//!
//! 1. validate the registry keys
//! 2. resolve the resource bundle through the cache
//! 3. select the input reader
//! 4. extract the input bytes from the message
//! 5. run the mapping engine
//! 6. select the output writer
//! 7. write the output document
//! 8. reconcile the document into the envelope
//!
//! The first failure ends the call. Only step 8 touches the message, and it
//! performs a single replacement, so a failed call leaves the message as it
//! was.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::datatype::DataType;
use crate::engine::{AdapterRegistry, InputStream, MappingEngine};
use crate::envelope::{is_envelope_marker, EnvelopeConverter, SoapEnvelopeConverter};
use crate::error::MediationError;
use crate::message::MessageContext;
use crate::resources::{ResourceCache, ResourceKey};
use crate::xml::XmlElement;

/// Per-call parameters: the three evaluated registry keys, the type tokens
/// and the identity of the calling mediator.
#[derive(Debug, Clone, Copy)]
pub struct TransformKeys<'a> {
    pub config_key: &'a str,
    pub input_schema_key: &'a str,
    pub output_schema_key: &'a str,
    pub input_type: &'a str,
    pub output_type: &'a str,
    pub identity: &'a str,
}

impl TransformKeys<'_> {
    /// Names of the registry keys that are empty.
    pub fn empty_keys(&self) -> Vec<&'static str> {
        [
            ("config_key", self.config_key),
            ("input_schema_key", self.input_schema_key),
            ("output_schema_key", self.output_schema_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Sequences resource resolution, mapping and reconciliation.
pub struct TransformOrchestrator {
    cache: Arc<ResourceCache>,
    adapters: Arc<AdapterRegistry>,
    engine: Arc<dyn MappingEngine>,
    converter: Arc<dyn EnvelopeConverter>,
}

impl TransformOrchestrator {
    pub fn new(
        cache: Arc<ResourceCache>,
        adapters: Arc<AdapterRegistry>,
        engine: Arc<dyn MappingEngine>,
    ) -> Self {
        Self {
            cache,
            adapters,
            engine,
            converter: Arc::new(SoapEnvelopeConverter),
        }
    }

    /// Replace the envelope converter used when the output is an envelope.
    pub fn with_converter(mut self, converter: Arc<dyn EnvelopeConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Transform the message in place.
    ///
    /// # Errors
    /// - `ConfigurationInvalid` if any registry key is empty; nothing else
    ///   is invoked in that case
    /// - `ResourceUnavailable` if the bundle cannot be resolved
    /// - `UnsupportedInputType` / `UnsupportedOutputType` for unknown tokens
    /// - `MappingFailure` for reader, engine or writer failures
    /// - `EnvelopeConversionFailure` if an envelope-shaped output is malformed
    pub fn orchestrate(
        &self,
        ctx: &mut MessageContext,
        keys: TransformKeys<'_>,
    ) -> Result<(), MediationError> {
        let empty_keys = keys.empty_keys();
        if !empty_keys.is_empty() {
            return Err(MediationError::ConfigurationInvalid { empty_keys });
        }

        let resource_key = ResourceKey::new(
            keys.identity,
            keys.config_key,
            keys.input_schema_key,
            keys.output_schema_key,
        );
        let resources = self.cache.get_or_resolve(&resource_key)?;

        let reader = self.adapters.input_reader(keys.input_type)?;
        let input = extract_input_stream(ctx, keys.input_type);
        let record = self.engine.map(input, &resources, reader.as_ref())?;

        let writer = self.adapters.output_writer(keys.output_type)?;
        let output = writer.write(keys.output_type, &record)?;

        match output {
            Some(document) => {
                debug!("Output message received");
                reconcile_output(ctx, document, self.converter.as_ref())
            }
            None => {
                debug!("Mapping produced no output message, leaving envelope untouched");
                Ok(())
            }
        }
    }
}

/// Bytes of the payload to feed the mapping engine.
///
/// JSON mediations read the transport's raw JSON payload and never fall back
/// to the envelope; every other token, known or not, serializes the body's
/// first element.
pub fn extract_input_stream(ctx: &MessageContext, input_type: &str) -> InputStream {
    match DataType::from_token(input_type) {
        Some(DataType::Json) => match ctx.json_payload() {
            Some(payload) => InputStream::from_bytes(payload),
            None => {
                debug!("No JSON payload on message, input stream is absent");
                InputStream::absent()
            }
        },
        Some(DataType::Xml) | Some(DataType::Csv) | None => {
            match ctx.envelope().body().first_element() {
                Some(payload) => InputStream::from_bytes(payload.to_string().into_bytes()),
                None => InputStream::absent(),
            }
        }
    }
}

/// Splice an output document into the message.
///
/// If the document's first child is a SOAP `Envelope`, that child replaces
/// the message's envelope. Otherwise the current body payload is detached
/// and the whole document is appended to the body.
pub fn reconcile_output(
    ctx: &mut MessageContext,
    document: XmlElement,
    converter: &dyn EnvelopeConverter,
) -> Result<(), MediationError> {
    if let Some(child) = document
        .first_element()
        .filter(|child| is_envelope_marker(&child.name))
    {
        debug!(marker = %child.name, "Output contains a SOAP envelope");
        let envelope = converter.convert(child)?;
        ctx.set_envelope(envelope);
        debug!("Message envelope replaced");
        return Ok(());
    }

    let body = ctx.envelope_mut().body_mut();
    if let Some(previous) = body.detach_first_element() {
        trace!(element = %previous.name, "Detached previous payload");
    }
    body.add_child(document);
    Ok(())
}
