//! Registry of input readers and output writers keyed by data type.
//!
//! Built once at startup; lookups by type token happen per mediation.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    CsvInputReader, CsvOutputWriter, InputReader, JsonInputReader, JsonOutputWriter,
    OutputWriter, XmlInputReader, XmlOutputWriter,
};
use crate::datatype::DataType;
use crate::error::MediationError;

/// Readers and writers for each supported [`DataType`].
pub struct AdapterRegistry {
    readers: HashMap<DataType, Arc<dyn InputReader>>,
    writers: HashMap<DataType, Arc<dyn OutputWriter>>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
            writers: HashMap::new(),
        }
    }

    /// Registry with the built-in XML, JSON and CSV readers and writers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_reader(Arc::new(XmlInputReader));
        registry.register_reader(Arc::new(JsonInputReader));
        registry.register_reader(Arc::new(CsvInputReader));
        registry.register_writer(Arc::new(XmlOutputWriter));
        registry.register_writer(Arc::new(JsonOutputWriter));
        registry.register_writer(Arc::new(CsvOutputWriter));
        registry
    }

    /// Register a reader under the type it declares, replacing any
    /// previous reader for that type.
    pub fn register_reader(&mut self, reader: Arc<dyn InputReader>) {
        self.readers.insert(reader.data_type(), reader);
    }

    /// Register a writer under the type it declares.
    pub fn register_writer(&mut self, writer: Arc<dyn OutputWriter>) {
        self.writers.insert(writer.data_type(), writer);
    }

    /// Select the reader for an input type token.
    ///
    /// # Errors
    /// `UnsupportedInputType` when the token is unknown or has no reader.
    pub fn input_reader(&self, token: &str) -> Result<Arc<dyn InputReader>, MediationError> {
        DataType::from_token(token)
            .and_then(|data_type| self.readers.get(&data_type))
            .cloned()
            .ok_or_else(|| MediationError::UnsupportedInputType(token.to_string()))
    }

    /// Select the writer for an output type token.
    ///
    /// # Errors
    /// `UnsupportedOutputType` when the token is unknown or has no writer.
    pub fn output_writer(&self, token: &str) -> Result<Arc<dyn OutputWriter>, MediationError> {
        DataType::from_token(token)
            .and_then(|data_type| self.writers.get(&data_type))
            .cloned()
            .ok_or_else(|| MediationError::UnsupportedOutputType(token.to_string()))
    }

    pub fn has_reader(&self, data_type: DataType) -> bool {
        self.readers.contains_key(&data_type)
    }

    pub fn has_writer(&self, data_type: DataType) -> bool {
        self.writers.contains_key(&data_type)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_types() {
        let registry = AdapterRegistry::with_defaults();
        for data_type in DataType::ALL {
            assert!(registry.has_reader(data_type));
            assert!(registry.has_writer(data_type));
        }
    }

    #[test]
    fn test_select_by_token() {
        let registry = AdapterRegistry::with_defaults();

        assert_eq!(registry.input_reader("xml").unwrap().data_type(), DataType::Xml);
        assert_eq!(registry.output_writer("CSV").unwrap().data_type(), DataType::Csv);
    }

    #[test]
    fn test_unknown_token() {
        let registry = AdapterRegistry::with_defaults();

        assert!(matches!(
            registry.input_reader("AVRO"),
            Err(MediationError::UnsupportedInputType(t)) if t == "AVRO"
        ));
        assert!(matches!(
            registry.output_writer(""),
            Err(MediationError::UnsupportedOutputType(_))
        ));
    }

    #[test]
    fn test_known_token_without_adapter() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.input_reader("JSON"),
            Err(MediationError::UnsupportedInputType(_))
        ));
    }
}
