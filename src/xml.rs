//! A minimal owned XML DOM.
//!
//! The decoder walks a tree of [`XmlElement`]s rather than a raw event
//! stream, because the push-down state machine needs look-back through
//! its frame stack and handlers read both attributes and the collected
//! text of an element. The tree is built from `quick-xml` events;
//! element and attribute names are stored without their namespace
//! prefixes (the prefixes vary across yEd exports), while the namespace
//! declarations of each element are kept verbatim for dialect
//! discrimination.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{CyberiadaError, Result};

/// One XML element with its attributes, namespace declarations,
/// collected text and child elements.
#[derive(Clone, Debug, Default)]
pub struct XmlElement {
    /// Local element name, prefix stripped.
    pub name: String,
    /// Attributes in document order, names with prefixes stripped
    /// (except `xml:*`, kept as-is to avoid collisions).
    pub attributes: Vec<(String, String)>,
    /// Namespace URIs declared on this element (`xmlns`, `xmlns:*`).
    pub namespaces: Vec<String>,
    /// Concatenated text content of the direct text children.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Value of an attribute by (local) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attribute parsed as a floating-point coordinate.
    pub fn coord(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(|value| value.trim().parse().ok())
    }
}

fn local_name(raw: &str) -> &str {
    match raw.split_once(':') {
        Some((_, local)) => local,
        None => raw,
    }
}

fn read_start(start: &BytesStart<'_>) -> Result<XmlElement> {
    let raw_name = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|e| CyberiadaError::xml(format!("bad element name: {e}")))?;
    let mut element = XmlElement {
        name: local_name(&raw_name).to_string(),
        ..XmlElement::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| CyberiadaError::xml(format!("bad attribute: {e}")))?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())
            .map_err(|e| CyberiadaError::xml(format!("bad attribute name: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| CyberiadaError::xml(format!("bad attribute value: {e}")))?
            .into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            element.namespaces.push(value);
        } else if key.starts_with("xml:") {
            element.attributes.push((key, value));
        } else {
            element
                .attributes
                .push((local_name(&key).to_string(), value));
        }
    }
    Ok(element)
}

/// Parse a byte buffer into the root element of its DOM tree.
pub fn parse(input: &[u8]) -> Result<XmlElement> {
    let mut reader = Reader::from_reader(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref start)) => {
                stack.push(read_start(start)?);
            }
            Ok(Event::Empty(ref start)) => {
                let element = read_start(start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CyberiadaError::xml("unbalanced end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let value = text
                        .unescape()
                        .map_err(|e| CyberiadaError::xml(format!("bad text node: {e}")))?;
                    top.text.push_str(&value);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    let value = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| CyberiadaError::xml(format!("bad CDATA node: {e}")))?;
                    top.text.push_str(&value);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(CyberiadaError::xml(format!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                )));
            }
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(CyberiadaError::xml("unclosed element at end of input"));
    }
    root.ok_or_else(|| CyberiadaError::xml("document has no root element"))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(CyberiadaError::xml("multiple root elements")),
    }
}
