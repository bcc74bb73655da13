//! Mapping engine contracts and reference implementations.
//!
//! The orchestrator only depends on the traits defined here:
//!
//! - [`InputReader`]: raw payload bytes to an [`IntermediateRecord`]
//! - [`MappingEngine`]: input record plus resources to an output record
//! - [`OutputWriter`]: output record to an optional XML output document
//!
//! Readers and writers are registered per [`DataType`] in an
//! [`AdapterRegistry`] built once at startup.

pub mod adapters;
pub mod convert;
pub mod mapping;
pub mod readers;
pub mod writers;

use serde_json::Value as JsonValue;

use crate::datatype::DataType;
use crate::extraction::FieldPathError;
use crate::resources::{FieldTransform, ResourceBundle, Schema};
use crate::xml::{XmlElement, XmlError};

pub use adapters::AdapterRegistry;
pub use mapping::FieldMappingEngine;
pub use readers::{CsvInputReader, JsonInputReader, XmlInputReader};
pub use writers::{CsvOutputWriter, JsonOutputWriter, XmlOutputWriter};

/// Errors raised by readers, the mapping engine and writers.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("No {0} input to map")]
    EmptyInput(DataType),

    #[error("Malformed {data_type} input: {message}")]
    Malformed { data_type: DataType, message: String },

    #[error("Invalid XML: {0}")]
    Xml(#[from] XmlError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Input root '{found}' does not match schema '{expected}'")]
    SchemaMismatch { expected: String, found: String },

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Cannot apply {transform:?} to field '{field}': {reason}")]
    Transform {
        field: String,
        transform: FieldTransform,
        reason: String,
    },

    #[error("Failed to write {data_type} output: {message}")]
    Write { data_type: DataType, message: String },

    #[error("Invalid mapping target: {0}")]
    Path(#[from] FieldPathError),
}

/// Payload bytes handed to the mapping engine. May be absent, e.g. when a
/// JSON mediation runs on a message without a JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputStream(Option<Vec<u8>>);

impl InputStream {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Some(bytes.into()))
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        self.0
    }
}

/// Engine-internal representation of a message, independent of its source
/// or target encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateRecord {
    name: String,
    namespace: Option<String>,
    value: JsonValue,
}

impl IntermediateRecord {
    pub fn new(name: impl Into<String>, namespace: Option<String>, value: JsonValue) -> Self {
        Self {
            name: name.into(),
            namespace,
            value,
        }
    }

    /// Record (schema) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    pub fn into_value(self) -> JsonValue {
        self.value
    }
}

/// Converts raw payload bytes of one encoding into an intermediate record.
pub trait InputReader: Send + Sync {
    fn data_type(&self) -> DataType;

    fn read(&self, input: &InputStream, schema: &Schema) -> Result<IntermediateRecord, MappingError>;
}

/// Serializes an intermediate record into an output document. `Ok(None)`
/// means there is nothing to substitute into the message.
pub trait OutputWriter: Send + Sync {
    fn data_type(&self) -> DataType;

    fn write(
        &self,
        output_type: &str,
        record: &IntermediateRecord,
    ) -> Result<Option<XmlElement>, MappingError>;
}

/// Produces the output record for one mapping.
pub trait MappingEngine: Send + Sync {
    fn map(
        &self,
        input: InputStream,
        resources: &ResourceBundle,
        reader: &dyn InputReader,
    ) -> Result<IntermediateRecord, MappingError>;
}
