//! Mediation failure signal.
//!
//! Every failure of a mediation surfaces as one [`MediationError`]; the
//! underlying cause, when there is one, is available through
//! [`std::error::Error::source`].

use crate::engine::MappingError;
use crate::envelope::EnvelopeError;
use crate::resources::ResourceError;

#[derive(Debug, thiserror::Error)]
pub enum MediationError {
    /// One or more of the three registry keys evaluated to an empty string.
    #[error("DataMapper mediator : Invalid configurations (empty: {})", .empty_keys.join(", "))]
    ConfigurationInvalid { empty_keys: Vec<&'static str> },

    #[error("Unsupported input type: {0}")]
    UnsupportedInputType(String),

    #[error("Unsupported output type: {0}")]
    UnsupportedOutputType(String),

    #[error("Mapping resources could not be resolved: {0}")]
    ResourceUnavailable(#[from] ResourceError),

    #[error("Mapping failed: {0}")]
    MappingFailure(#[from] MappingError),

    #[error("Invalid Envelope: {0}")]
    EnvelopeConversionFailure(#[from] EnvelopeError),
}

impl MediationError {
    /// Whether the failure stems from mediator configuration rather than
    /// from the message being mediated.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            MediationError::ConfigurationInvalid { .. }
                | MediationError::UnsupportedInputType(_)
                | MediationError::UnsupportedOutputType(_)
                | MediationError::ResourceUnavailable(_)
        )
    }
}
