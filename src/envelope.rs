//! SOAP envelope model.
//!
//! A [`SoapEnvelope`] is the protocol wrapper carried by every mediated
//! message. Its body holds the current payload; the data mapper replaces that
//! payload, or swaps the whole envelope when the mapping output is itself an
//! envelope.

use std::fmt;

use indexmap::IndexMap;

use crate::xml::{QName, XmlElement, XmlError, XmlNode};

pub const SOAP11_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENVELOPE_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

const DEFAULT_PREFIX: &str = "soapenv";

/// Errors raised while converting an element tree into an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Element {0} is not a SOAP envelope")]
    NotAnEnvelope(String),

    #[error("SOAP envelope has no Body element")]
    MissingBody,

    #[error("SOAP envelope has more than one Body element")]
    DuplicateBody,

    #[error("Unexpected element {0} inside SOAP envelope")]
    UnexpectedElement(String),

    #[error("SOAP Body carries character data outside any payload element")]
    BodyText,

    #[error("Invalid envelope XML: {0}")]
    Xml(#[from] XmlError),
}

/// SOAP protocol version, identified by the envelope namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP11_ENVELOPE_NAMESPACE,
            SoapVersion::Soap12 => SOAP12_ENVELOPE_NAMESPACE,
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_ENVELOPE_NAMESPACE => Some(SoapVersion::Soap11),
            SOAP12_ENVELOPE_NAMESPACE => Some(SoapVersion::Soap12),
            _ => None,
        }
    }
}

/// Whether a name marks a SOAP envelope: local part `Envelope` in either
/// the SOAP 1.1 or the SOAP 1.2 namespace.
pub fn is_envelope_marker(name: &QName) -> bool {
    name.local == "Envelope" && SoapVersion::from_namespace(name.namespace_uri()).is_some()
}

/// The body of an envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoapBody {
    attributes: IndexMap<String, String>,
    children: Vec<XmlElement>,
}

impl SoapBody {
    /// The current payload element.
    pub fn first_element(&self) -> Option<&XmlElement> {
        self.children.first()
    }

    /// Remove and return the current payload element.
    pub fn detach_first_element(&mut self) -> Option<XmlElement> {
        if self.children.is_empty() {
            None
        } else {
            Some(self.children.remove(0))
        }
    }

    /// Append a child after any existing children.
    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A SOAP 1.1 or 1.2 envelope: optional header and a body.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapEnvelope {
    version: SoapVersion,
    prefix: String,
    attributes: IndexMap<String, String>,
    header: Option<XmlElement>,
    body: SoapBody,
}

impl SoapEnvelope {
    /// Empty envelope of the given version.
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            prefix: DEFAULT_PREFIX.to_string(),
            attributes: IndexMap::new(),
            header: None,
            body: SoapBody::default(),
        }
    }

    /// Envelope whose body carries a single payload element.
    pub fn with_payload(version: SoapVersion, payload: XmlElement) -> Self {
        let mut envelope = Self::new(version);
        envelope.body.add_child(payload);
        envelope
    }

    /// Parse envelope markup.
    pub fn parse(input: &str) -> Result<Self, EnvelopeError> {
        let element = XmlElement::parse(input)?;
        Self::from_element(&element)
    }

    /// Build an envelope from an element tree rooted at `Envelope`.
    ///
    /// The root must be in a SOAP namespace and contain an optional `Header`
    /// followed by exactly one `Body`, both in the same namespace. The body
    /// holds elements only; bare text in it is rejected.
    pub fn from_element(element: &XmlElement) -> Result<Self, EnvelopeError> {
        if !is_envelope_marker(&element.name) {
            return Err(EnvelopeError::NotAnEnvelope(element.name.to_string()));
        }
        let namespace = element.name.namespace_uri();
        let version =
            SoapVersion::from_namespace(namespace).ok_or_else(|| {
                EnvelopeError::NotAnEnvelope(element.name.to_string())
            })?;

        let mut header = None;
        let mut body: Option<SoapBody> = None;

        for child in element.child_elements() {
            let in_soap_ns = child.name.namespace_uri() == namespace;
            match child.name.local.as_str() {
                "Header" if in_soap_ns && header.is_none() && body.is_none() => {
                    header = Some(child.clone());
                }
                "Body" if in_soap_ns => {
                    if body.is_some() {
                        return Err(EnvelopeError::DuplicateBody);
                    }
                    let has_text = child.children.iter().any(
                        |node| matches!(node, XmlNode::Text(text) if !text.trim().is_empty()),
                    );
                    if has_text {
                        return Err(EnvelopeError::BodyText);
                    }
                    body = Some(SoapBody {
                        attributes: child.attributes.clone(),
                        children: child.child_elements().cloned().collect(),
                    });
                }
                _ => return Err(EnvelopeError::UnexpectedElement(child.name.to_string())),
            }
        }

        Ok(Self {
            version,
            prefix: element
                .name
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            attributes: element.attributes.clone(),
            header,
            body: body.ok_or(EnvelopeError::MissingBody)?,
        })
    }

    /// Element tree for this envelope.
    pub fn to_element(&self) -> XmlElement {
        let ns = self.version.namespace();
        let name = |local: &str| QName::prefixed(ns, self.prefix.clone(), local);

        let mut envelope = XmlElement::new(name("Envelope"));
        envelope.attributes = self.attributes.clone();
        if let Some(header) = &self.header {
            envelope.add_child(header.clone());
        }

        let mut body = XmlElement::new(name("Body"));
        body.attributes = self.body.attributes.clone();
        body.children = self
            .body
            .children
            .iter()
            .cloned()
            .map(XmlNode::Element)
            .collect();
        envelope.add_child(body);
        envelope
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn header(&self) -> Option<&XmlElement> {
        self.header.as_ref()
    }

    pub fn body(&self) -> &SoapBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut SoapBody {
        &mut self.body
    }
}

impl fmt::Display for SoapEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_element())
    }
}

/// Converts an output fragment rooted at an envelope marker into an envelope.
pub trait EnvelopeConverter: Send + Sync {
    fn convert(&self, fragment: &XmlElement) -> Result<SoapEnvelope, EnvelopeError>;
}

/// Structural converter backed by [`SoapEnvelope::from_element`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SoapEnvelopeConverter;

impl EnvelopeConverter for SoapEnvelopeConverter {
    fn convert(&self, fragment: &XmlElement) -> Result<SoapEnvelope, EnvelopeError> {
        SoapEnvelope::from_element(fragment)
    }
}
