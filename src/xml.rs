//! A small namespace-aware XML tree. Format providers, the glossary
//! generator, and the renderer all exchange [`Element`]s so that downstream
//! code manipulates the same kind of tree regardless of where the markup came
//! from. Parsing and serialization are delegated to [`quick_xml`].

use crate::error::{Error, ErrorKind, LexicalPosition};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::Path;

/// The XHTML namespace URI.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const XHTML_DOCTYPE: &str = r#"html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd""#;

/// Elements written as `<name/>` when they have no children.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "meta", "link", "input"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// The local name (no prefix).
    pub name: String,

    /// The namespace URI, if the element is in one.
    pub namespace: Option<String>,

    /// Attributes in document order. Namespace declarations are not stored
    /// here; they are folded into [`Element::namespace`].
    pub attributes: Vec<(String, String)>,

    pub children: Vec<Node>,
}

impl Element {
    pub fn new<S: Into<String>>(name: S) -> Element {
        Element {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element in the XHTML namespace.
    pub fn xhtml<S: Into<String>>(name: S) -> Element {
        let mut e = Element::new(name);
        e.namespace = Some(XHTML_NAMESPACE.to_owned());
        e
    }

    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Element {
        self.set_attribute(key, value);
        self
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Element {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Element {
        self.push_element(child);
        self
    }

    pub fn set_attribute<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text<S: Into<String>>(&mut self, text: S) {
        self.children.push(Node::Text(text.into()));
    }

    /// Inserts `child` before the existing children.
    pub fn prepend_element(&mut self, child: Element) {
        self.children.insert(0, Node::Element(child));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Returns every descendant element (depth-first, document order) named
    /// `name`, including `self`.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        if self.name == name {
            found.push(self);
        }
        for child in self.child_elements() {
            child.collect_named(name, found);
        }
    }

    /// The concatenation of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => text.push_str(t),
                Node::Element(e) => e.collect_text(text),
            }
        }
    }

    /// Moves this element and every descendant element into `namespace`.
    pub fn set_namespace_recursive(&mut self, namespace: &str) {
        self.namespace = Some(namespace.to_owned());
        for child in self.children.iter_mut() {
            if let Node::Element(e) = child {
                e.set_namespace_recursive(namespace);
            }
        }
    }

    /// Serializes the element as a standalone fragment (no XML declaration).
    pub fn to_xml_string(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self, None).map_err(transform_error)?;
        into_string(writer.into_inner())
    }

    /// Serializes the element as the root of a complete XHTML document,
    /// including the XML declaration and the XHTML 1.0 Strict doctype.
    pub fn to_xhtml_document(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::new());
        write_document(&mut writer, self).map_err(transform_error)?;
        into_string(writer.into_inner())
    }
}

fn write_document(writer: &mut Writer<Vec<u8>>, root: &Element) -> quick_xml::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(XHTML_DOCTYPE)))?;
    writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    write_element(writer, root, None)?;
    writer.write_event(Event::Text(BytesText::from_escaped("\n")))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    parent_namespace: Option<&str>,
) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    let namespace = element.namespace.as_deref();
    if namespace != parent_namespace {
        start.push_attribute(("xmlns", namespace.unwrap_or("")));
    }
    for (k, v) in &element.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }

    if element.children.is_empty() && VOID_ELEMENTS.contains(&element.name.as_str()) {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            Node::Element(e) => write_element(writer, e, namespace)?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}

fn into_string(bytes: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(bytes).map_err(|e| {
        Error::new(ErrorKind::Transform, "Serialized XML is not valid UTF-8").caused_by(e)
    })
}

fn transform_error(err: quick_xml::Error) -> Error {
    Error::new(ErrorKind::Transform, "Could not serialize XML").caused_by(err)
}

const MALFORMED: &str = "Malformed XML";

/// Namespace bindings in effect for one open element.
#[derive(Clone, Default)]
struct Scope {
    default: Option<String>,
    prefixes: HashMap<String, String>,
}

/// Parses `text` as a single-rooted XML document and returns its root
/// element. Failures are reported as [`ErrorKind::Transform`] errors whose
/// position is computed from the parser's offset into `text`, shifted up by
/// `line_offset` lines (for callers that wrap the text they received), and
/// attributed to `source`.
pub fn parse(text: &str, source: &Path, line_offset: u32) -> Result<Element, Error> {
    let fail = |offset: usize, message: String| {
        let (line, column) = line_and_column(text, offset);
        Error::new(ErrorKind::Transform, message).at(LexicalPosition::new(
            line.saturating_sub(line_offset),
            column,
            Some(source.to_owned()),
        ))
    };

    let mut reader = Reader::from_str(text);
    let mut open: Vec<(Element, Scope)> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if root.is_some() {
                    return Err(fail(offset, "Content is not allowed after the root element".into()));
                }
                let scope = open.last().map(|(_, s)| s.clone()).unwrap_or_default();
                let opened = open_element(&start, scope).map_err(|e| {
                    fail(reader.buffer_position(), MALFORMED.into()).caused_by(e)
                })?;
                open.push(opened);
            }
            Ok(Event::Empty(start)) => {
                if root.is_some() {
                    return Err(fail(offset, "Content is not allowed after the root element".into()));
                }
                let scope = open.last().map(|(_, s)| s.clone()).unwrap_or_default();
                let (element, _) = open_element(&start, scope).map_err(|e| {
                    fail(reader.buffer_position(), MALFORMED.into()).caused_by(e)
                })?;
                close_element(element, &mut open, &mut root);
            }
            Ok(Event::End(_)) => match open.pop() {
                Some((element, _)) => close_element(element, &mut open, &mut root),
                None => return Err(fail(offset, "Unexpected closing tag".into())),
            },
            Ok(Event::Text(t)) => {
                let unescaped = t.unescape().map_err(|e| {
                    fail(reader.buffer_position(), MALFORMED.into()).caused_by(e)
                })?;
                append_text(&mut open, &unescaped)
                    .map_err(|message| fail(offset, message))?;
            }
            Ok(Event::CData(c)) => {
                let raw = c.into_inner();
                let s = std::str::from_utf8(&raw).map_err(|e| {
                    fail(offset, MALFORMED.into()).caused_by(e)
                })?;
                append_text(&mut open, s).map_err(|message| fail(offset, message))?;
            }
            Ok(Event::Eof) => break,
            // Comments, processing instructions, declarations and doctypes
            // carry nothing the tree needs.
            Ok(_) => {}
            Err(e) => {
                return Err(fail(reader.buffer_position(), MALFORMED.into()).caused_by(e));
            }
        }
    }

    if let Some((element, _)) = open.last() {
        return Err(fail(
            text.len(),
            format!("Unexpected end of input: element `{}` is not closed", element.name),
        ));
    }
    root.ok_or_else(|| fail(text.len(), "Document has no root element".into()))
}

fn open_element(start: &BytesStart, mut scope: Scope) -> quick_xml::Result<(Element, Scope)> {
    let qualified = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| quick_xml::Error::NonDecodable(Some(e)))?
        .to_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| quick_xml::Error::NonDecodable(Some(e)))?
            .to_owned();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            scope.default = if value.is_empty() { None } else { Some(value) };
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.prefixes.insert(prefix.to_owned(), value);
        } else {
            attributes.push((key, value));
        }
    }

    let (namespace, name) = match qualified.split_once(':') {
        Some((prefix, local)) => (scope.prefixes.get(prefix).cloned(), local.to_owned()),
        None => (scope.default.clone(), qualified),
    };

    Ok((
        Element {
            name,
            namespace,
            attributes,
            children: Vec::new(),
        },
        scope,
    ))
}

fn close_element(element: Element, open: &mut Vec<(Element, Scope)>, root: &mut Option<Element>) {
    match open.last_mut() {
        Some((parent, _)) => parent.push_element(element),
        None => *root = Some(element),
    }
}

fn append_text(open: &mut Vec<(Element, Scope)>, text: &str) -> Result<(), String> {
    match open.last_mut() {
        Some((parent, _)) => {
            // Merge with a preceding text node so entity boundaries don't
            // split text.
            if let Some(Node::Text(previous)) = parent.children.last_mut() {
                previous.push_str(text);
            } else {
                parent.push_text(text);
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("Text is not allowed outside the root element".to_owned()),
    }
}

/// Converts a byte offset into a 1-based line and column.
fn line_and_column(text: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(text.len());
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let column = match before.iter().rposition(|b| *b == b'\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    (line as u32, column as u32)
}

#[cfg(test)]
mod test {
    use super::*;

    fn source() -> &'static Path {
        Path::new("/test.xml")
    }

    #[test]
    fn test_parse_resolves_default_namespace() -> Result<(), Error> {
        let root = parse(
            r#"<div xmlns="http://www.w3.org/1999/xhtml"><p class="x">a &amp; b</p></div>"#,
            source(),
            0,
        )?;
        assert_eq!(root.namespace.as_deref(), Some(XHTML_NAMESPACE));
        let p = root.child_elements().next().unwrap();
        assert_eq!(p.namespace.as_deref(), Some(XHTML_NAMESPACE));
        assert_eq!(p.attribute("class"), Some("x"));
        assert_eq!(p.text_content(), "a & b");
        Ok(())
    }

    #[test]
    fn test_parse_resolves_prefixed_namespace() -> Result<(), Error> {
        let root = parse(r#"<x:a xmlns:x="urn:x"><x:b/><c/></x:a>"#, source(), 0)?;
        assert_eq!(root.name, "a");
        assert_eq!(root.namespace.as_deref(), Some("urn:x"));
        let children: Vec<&Element> = root.child_elements().collect();
        assert_eq!(children[0].namespace.as_deref(), Some("urn:x"));
        assert_eq!(children[1].namespace, None);
        Ok(())
    }

    #[test]
    fn test_parse_reports_position() {
        let err = parse("<a>\n<b>\n</a>", source(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transform);
        assert_eq!(err.position().line, 3);
        assert_eq!(err.position().file.as_deref(), Some(source()));
    }

    #[test]
    fn test_parse_error_states_detail_once() {
        let err = parse("<a>\n<b>\n</a>", source(), 0).unwrap_err();
        assert_eq!(err.message(), "Malformed XML");
        let detail = err.cause().map(|c| c.to_string()).unwrap();
        assert_eq!(err.to_string().matches(detail.as_str()).count(), 1);
    }

    #[test]
    fn test_parse_rejects_unclosed() {
        let err = parse("<a><b></b>", source(), 0).unwrap_err();
        assert!(err.message().contains("not closed"));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(parse("   ", source(), 0).is_err());
    }

    #[test]
    fn test_serialize_emits_namespace_once() -> Result<(), Error> {
        let e = Element::xhtml("div")
            .with_child(Element::xhtml("p").with_text("1 < 2"))
            .with_child(Element::xhtml("br"));
        assert_eq!(
            e.to_xml_string()?,
            r#"<div xmlns="http://www.w3.org/1999/xhtml"><p>1 &lt; 2</p><br/></div>"#
        );
        Ok(())
    }

    #[test]
    fn test_serialize_parse_preserves_tree() -> Result<(), Error> {
        let e = Element::xhtml("div")
            .with_attribute("class", "a\"b")
            .with_child(Element::new("plain").with_text("text"));
        let reparsed = parse(&e.to_xml_string()?, source(), 0)?;
        assert_eq!(e, reparsed);
        Ok(())
    }

    #[test]
    fn test_document_has_doctype() -> Result<(), Error> {
        let doc = Element::xhtml("html").to_xhtml_document()?;
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.contains("<!DOCTYPE html PUBLIC"));
        Ok(())
    }
}
