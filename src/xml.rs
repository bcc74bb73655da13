//! Ordered XML element tree with namespace-qualified names.
//!
//! Envelopes, body payloads and output documents are all represented as
//! [`XmlElement`] trees. Parsing goes through `quick-xml`'s namespace-aware
//! reader; serialization is hand-written so that namespace declarations are
//! emitted only where they are not already in scope.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

/// Errors raised while parsing XML text.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("Malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Invalid UTF-8 in XML document: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Unbound namespace prefix '{0}'")]
    UnboundPrefix(String),

    #[error("Document has no root element")]
    NoRootElement,

    #[error("Document has more than one root element")]
    MultipleRoots,

    #[error("Unexpected end of document inside <{0}>")]
    UnclosedElement(String),

    #[error("Document nests deeper than {0} elements")]
    TooDeep(usize),
}

/// Deepest element nesting accepted by [`XmlElement::parse`].
///
/// Serialization, conversion and drop all walk the tree recursively, so
/// parsing refuses anything deeper.
pub const MAX_DEPTH: usize = 256;

/// A namespace-qualified element name.
///
/// Equality and hashing consider only the namespace URI and the local part;
/// the prefix is a serialization detail.
#[derive(Debug, Clone)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
    pub prefix: Option<String>,
}

impl QName {
    /// Unqualified name with no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
            prefix: None,
        }
    }

    /// Name in the given namespace, serialized as the default namespace.
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
            prefix: None,
        }
    }

    /// Name in the given namespace, serialized with an explicit prefix.
    pub fn prefixed(
        namespace: impl Into<String>,
        prefix: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
            prefix: Some(prefix.into()),
        }
    }

    /// Namespace URI, or `""` when the name is unqualified.
    pub fn namespace_uri(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    /// Name as written in markup (`prefix:local` or `local`).
    pub fn raw(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.namespace_uri() == other.namespace_uri()
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace_uri().hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => write!(f, "{{{}}}{}", ns, self.local),
            _ => write!(f, "{}", self.local),
        }
    }
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with ordered attributes and children.
///
/// Attribute keys are kept as written (`id`, `xmlns:soapenv`), so namespace
/// declarations survive a parse/serialize cycle. `attribute_namespaces` maps
/// the prefixes used by prefixed attributes to the URI they were bound to,
/// so an element serialized away from its ancestors stays well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: QName,
    pub attributes: IndexMap<String, String>,
    pub attribute_namespaces: IndexMap<String, String>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: IndexMap::new(),
            attribute_namespaces: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Append a child element at the end.
    pub fn add_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// First child element, skipping text nodes.
    pub fn first_element(&self) -> Option<&XmlElement> {
        self.child_elements().next()
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Value of an attribute by its written name.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Parse a document and return its root element.
    ///
    /// Comments, processing instructions and the XML declaration are
    /// dropped. Whitespace-only text between elements is trimmed. Documents
    /// nested deeper than [`MAX_DEPTH`] are rejected with
    /// [`XmlError::TooDeep`].
    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_str(input);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = match resolved {
                ResolveResult::Bound(ns) => Some(std::str::from_utf8(ns.as_ref())?.to_string()),
                ResolveResult::Unbound => None,
                ResolveResult::Unknown(prefix) => {
                    return Err(XmlError::UnboundPrefix(
                        String::from_utf8_lossy(&prefix).into_owned(),
                    ))
                }
            };

            match event {
                Event::Start(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::TooDeep(MAX_DEPTH));
                    }
                    stack.push(element_from_start(&reader, &start, namespace)?);
                }
                Event::Empty(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::TooDeep(MAX_DEPTH));
                    }
                    let element = element_from_start(&reader, &start, namespace)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml already rejects mismatched end tags
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape()?;
                        if !text.is_empty() {
                            parent.children.push(XmlNode::Text(text.into_owned()));
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = std::str::from_utf8(&data)?.to_string();
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::UnclosedElement(open.name.raw()));
        }
        root.ok_or(XmlError::NoRootElement)
    }

    fn write_to(&self, out: &mut String, scope: &mut Vec<(String, String)>) {
        let scope_mark = scope.len();
        let tag = self.name.raw();

        out.push('<');
        out.push_str(&tag);

        for (key, value) in &self.attributes {
            if key == "xmlns" {
                scope.push((String::new(), value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                scope.push((prefix.to_string(), value.clone()));
            }
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        for (prefix, uri) in &self.attribute_namespaces {
            if lookup(scope, prefix) != Some(uri.as_str()) {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
                out.push_str(&escape(uri.as_str()));
                out.push('"');
                scope.push((prefix.clone(), uri.clone()));
            }
        }

        let prefix = self.name.prefix.clone().unwrap_or_default();
        let wanted = self.name.namespace_uri().to_string();
        let in_scope = lookup(scope, &prefix).unwrap_or("");
        if in_scope != wanted {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(&prefix);
                out.push_str("=\"");
            }
            out.push_str(&escape(wanted.as_str()));
            out.push('"');
            scope.push((prefix, wanted));
        }

        if self.children.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            for child in &self.children {
                match child {
                    XmlNode::Element(element) => element.write_to(out, scope),
                    XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
                }
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }

        scope.truncate(scope_mark);
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out, &mut Vec::new());
        f.write_str(&out)
    }
}

fn lookup<'a>(scope: &'a [(String, String)], prefix: &str) -> Option<&'a str> {
    scope
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, ns)| ns.as_str())
}

fn element_from_start(
    reader: &NsReader<&[u8]>,
    start: &quick_xml::events::BytesStart<'_>,
    namespace: Option<String>,
) -> Result<XmlElement, XmlError> {
    let local = std::str::from_utf8(start.local_name().as_ref())?.to_string();
    let prefix = match start.name().prefix() {
        Some(p) => Some(std::str::from_utf8(p.as_ref())?.to_string()),
        None => None,
    };

    let mut element = XmlElement::new(QName {
        namespace,
        local,
        prefix,
    });

    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.into_owned();

        if let Some(prefix) = attr.key.prefix() {
            let prefix = std::str::from_utf8(prefix.as_ref())?;
            if prefix != "xmlns" && prefix != "xml" {
                match reader.resolve_attribute(attr.key).0 {
                    ResolveResult::Bound(ns) => {
                        let uri = std::str::from_utf8(ns.as_ref())?.to_string();
                        element.attribute_namespaces.insert(prefix.to_string(), uri);
                    }
                    _ => return Err(XmlError::UnboundPrefix(prefix.to_string())),
                }
            }
        }
        element.attributes.insert(key, value);
    }

    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.add_child(element);
            Ok(())
        }
        None if root.is_some() => Err(XmlError::MultipleRoots),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let element = XmlElement::parse(r#"<order id="1"><item>pen</item></order>"#).unwrap();

        assert_eq!(element.name, QName::local("order"));
        assert_eq!(element.attribute("id"), Some("1"));
        let item = element.first_element().unwrap();
        assert_eq!(item.name.local, "item");
        assert_eq!(item.text(), "pen");
    }

    #[test]
    fn test_parse_resolves_namespaces() {
        let input = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><p:a xmlns:p="urn:a"/></s:Body></s:Envelope>"#;
        let element = XmlElement::parse(input).unwrap();

        assert_eq!(
            element.name,
            QName::qualified("http://schemas.xmlsoap.org/soap/envelope/", "Envelope")
        );
        assert_eq!(element.name.prefix.as_deref(), Some("s"));
        let payload = element.first_element().unwrap().first_element().unwrap();
        assert_eq!(payload.name, QName::qualified("urn:a", "a"));
    }

    #[test]
    fn test_serialize_round_trip_preserves_markup() {
        let input = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><order id="1"/></s:Body></s:Envelope>"#;
        let element = XmlElement::parse(input).unwrap();
        assert_eq!(element.to_string(), input);
    }

    #[test]
    fn test_serialize_declares_missing_namespace() {
        let element = XmlElement::new(QName::prefixed("urn:x", "x", "root"))
            .with_child(XmlElement::new(QName::prefixed("urn:x", "x", "leaf")).with_text("a<b"));

        assert_eq!(
            element.to_string(),
            r#"<x:root xmlns:x="urn:x"><x:leaf>a&lt;b</x:leaf></x:root>"#
        );
    }

    #[test]
    fn test_serialize_resets_default_namespace() {
        let element = XmlElement::new(QName::qualified("urn:outer", "outer"))
            .with_child(XmlElement::new(QName::local("inner")));

        assert_eq!(
            element.to_string(),
            r#"<outer xmlns="urn:outer"><inner xmlns=""/></outer>"#
        );
    }

    #[test]
    fn test_parse_rejects_unbound_prefix() {
        let result = XmlElement::parse("<p:a/>");
        assert!(matches!(result, Err(XmlError::UnboundPrefix(_))));
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        assert!(matches!(XmlElement::parse(""), Err(XmlError::NoRootElement)));
    }

    #[test]
    fn test_parse_rejects_unclosed_element() {
        assert!(XmlElement::parse("<a><b></b>").is_err());
    }

    fn nested(depth: usize) -> String {
        format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth))
    }

    #[test]
    fn test_parse_rejects_deep_nesting() {
        let result = XmlElement::parse(&nested(200_000));
        assert!(matches!(result, Err(XmlError::TooDeep(MAX_DEPTH))));

        let empty_leaf = format!(
            "{}<b/>{}",
            "<a>".repeat(MAX_DEPTH),
            "</a>".repeat(MAX_DEPTH)
        );
        let result = XmlElement::parse(&empty_leaf);
        assert!(matches!(result, Err(XmlError::TooDeep(_))));
    }

    #[test]
    fn test_parse_accepts_nesting_at_limit() {
        let input = nested(MAX_DEPTH);
        let element = XmlElement::parse(&input).unwrap();
        assert_eq!(element.to_string().matches("<a>").count(), MAX_DEPTH - 1);
    }

    #[test]
    fn test_detached_element_declares_attribute_prefix() {
        let input = r#"<root xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><order xsi:nil="true"/></root>"#;
        let root = XmlElement::parse(input).unwrap();
        assert_eq!(root.to_string(), input);

        let order = root.first_element().unwrap().to_string();
        assert_eq!(
            order,
            r#"<order xsi:nil="true" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/>"#
        );
        let reparsed = XmlElement::parse(&order).unwrap();
        assert_eq!(reparsed.attribute("xsi:nil"), Some("true"));
    }

    #[test]
    fn test_parse_rejects_unbound_attribute_prefix() {
        let result = XmlElement::parse(r#"<a p:x="1"/>"#);
        assert!(matches!(result, Err(XmlError::UnboundPrefix(p)) if p == "p"));
    }

    #[test]
    fn test_qname_equality_ignores_prefix() {
        let a = QName::prefixed("urn:a", "p", "x");
        let b = QName::prefixed("urn:a", "q", "x");
        assert_eq!(a, b);
        assert_ne!(a, QName::local("x"));
    }
}
