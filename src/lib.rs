//! # datamapper-mediator: Schema-Driven Message Transformation
//!
//! Plugs a data mapping engine into a SOAP mediation flow. For each message
//! the mediator resolves its mapping resources, reads the payload with the
//! declared input reader, maps it, writes it with the declared output writer
//! and splices the result back into the envelope.
//!
//! ## Features
//!
//! - **Transform orchestration**: linear pipeline that never leaves the
//!   envelope half-mutated
//! - **Output reconciliation**: plain output replaces the body payload; an
//!   output that is itself a SOAP 1.1/1.2 envelope replaces the envelope
//! - **Resource cache**: concurrent reads, single-flight population per key
//! - **Pluggable adapters**: XML, JSON and CSV readers and writers selected
//!   by type token
//! - **Dynamic registry keys**: `{$ctx:name}` and `{get-property('name')}`
//!   evaluated against message properties
//!
//! ## Example configuration
//!
//! ```yaml
//! mediator:
//!   config_key: conf:datamapper/order.dmc
//!   input_schema_key: conf:datamapper/order_in.json
//!   output_schema_key: conf:datamapper/status_out.json
//!   input_type: XML
//!   output_type: JSON
//! registry:
//!   config_root: ./registry/config
//!   governance_root: ./registry/governance
//! ```

// Document model
pub mod envelope;
pub mod xml;

// Message and keys
pub mod datatype;
pub mod extraction;
pub mod key;
pub mod message;

// Mapping resources and engine
pub mod engine;
pub mod resources;

// Orchestration
pub mod config;
pub mod error;
pub mod mediator;
pub mod orchestrator;

// Re-export key types
pub use config::{ConfigError, MediatorConfig};
pub use datatype::DataType;
pub use envelope::{EnvelopeConverter, EnvelopeError, SoapEnvelope, SoapEnvelopeConverter, SoapVersion};
pub use error::MediationError;
pub use extraction::FieldPath;
pub use key::RegistryKey;
pub use mediator::DataMapperMediator;
pub use message::MessageContext;
pub use orchestrator::{TransformKeys, TransformOrchestrator};
pub use xml::{QName, XmlElement, XmlError};

// Re-export engine and resource types
pub use engine::{
    AdapterRegistry, FieldMappingEngine, InputReader, InputStream, IntermediateRecord,
    MappingEngine, MappingError, OutputWriter,
};
pub use resources::{
    FileSystemRegistry, InMemoryRegistry, RegistryResourceResolver, ResourceBundle, ResourceCache,
    ResourceError, ResourceKey, ResourceRegistry, ResourceResolver,
};
