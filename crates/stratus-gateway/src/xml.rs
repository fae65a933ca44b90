// crates/stratus-gateway/src/xml.rs
// ============================================================================
// Module: Markup Documents
// Description: Minimal XML element tree and writer for markup responses.
// Purpose: Let handlers describe result payloads without touching the writer.
// Dependencies: quick-xml, serde
// ============================================================================

//! ## Overview
//! [`XmlNode`] is an owned element tree: every node is either a text leaf or
//! a parent of child nodes. [`render_document`] writes a tree through
//! `quick_xml::Writer`, which handles escaping. Request bodies are parsed
//! separately with `quick_xml::de` into serde structs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use quick_xml::Writer;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Content of an [`XmlNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlContent {
    /// Escaped text content.
    Text(String),
    /// Nested elements.
    Children(Vec<XmlNode>),
}

/// Owned XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    /// Element name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Element content.
    pub content: XmlContent,
}

impl XmlNode {
    /// Builds a text leaf.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            content: XmlContent::Text(value.to_string()),
        }
    }

    /// Builds a parent element.
    #[must_use]
    pub fn parent(name: impl Into<String>, children: Vec<Self>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            content: XmlContent::Children(children),
        }
    }

    /// Builds a list element whose children all share `item` as their name.
    #[must_use]
    pub fn list<I>(name: impl Into<String>, item: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        Self::parent(name, values.into_iter().map(|value| Self::text(item, value)).collect())
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Returns the first child named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        match &self.content {
            XmlContent::Children(children) => children.iter().find(|child| child.name == name),
            XmlContent::Text(_) => None,
        }
    }

    /// Returns the text content of a leaf.
    #[must_use]
    pub fn text_value(&self) -> Option<&str> {
        match &self.content {
            XmlContent::Text(text) => Some(text),
            XmlContent::Children(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Renders a complete document with an XML declaration.
///
/// # Errors
///
/// Returns an internal [`ApiError`] when the writer fails.
pub fn render_document(root: &XmlNode) -> Result<Vec<u8>, ApiError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|err| ApiError::internal(err.to_string()))?;
    write_node(&mut writer, root)?;
    Ok(writer.into_inner())
}

/// Writes one element and its subtree.
fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), ApiError> {
    let mut start = BytesStart::new(node.name.as_str());
    for (name, value) in &node.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    writer.write_event(Event::Start(start)).map_err(|err| ApiError::internal(err.to_string()))?;
    match &node.content {
        XmlContent::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|err| ApiError::internal(err.to_string()))?,
        XmlContent::Children(children) => {
            for child in children {
                write_node(writer, child)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(|err| ApiError::internal(err.to_string()))
}

// ============================================================================
// SECTION: Reader
// ============================================================================

/// Parses a request document into `T`.
///
/// # Errors
///
/// Returns a validation [`ApiError`] when the body is not valid UTF-8 or does
/// not match `T`.
pub fn parse_document<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| ApiError::validation("request body is not valid UTF-8"))?;
    quick_xml::de::from_str(text)
        .map_err(|err| ApiError::validation(format!("malformed request document: {err}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
