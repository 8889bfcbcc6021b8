//! The XHTML body format: post bodies that are already XHTML markup.

use crate::error::Result;
use crate::format::Format;
use crate::xml::{self, Element, XHTML_NAMESPACE};
use std::path::Path;

/// The name posts use to select XHTML bodies.
pub const XHTML_FORMAT: &str = "com.io7m.zeptoblog.xhtml";

/// The XHTML [`Format`] provider. The body is parsed as the content of an
/// XHTML `<div>`; every element in it is moved into the XHTML namespace so
/// authors can leave out `xmlns` declarations.
pub struct XhtmlFormat;

impl Format for XhtmlFormat {
    fn name(&self) -> &str {
        XHTML_FORMAT
    }

    fn description(&self) -> &str {
        "XHTML 1.0 Strict"
    }

    fn produce_xhtml(&self, path: &Path, text: &str) -> Result<Element> {
        let document = format!("<div xmlns=\"{}\">\n{}\n</div>", XHTML_NAMESPACE, text);
        let mut root = xml::parse(&document, path, 1).map_err(|e| vec![e])?;
        root.set_namespace_recursive(XHTML_NAMESPACE);
        Ok(root)
    }

    /// Strips all markup and trims every resulting line.
    fn produce_plain(&self, path: &Path, text: &str) -> Result<String> {
        let content = self.produce_xhtml(path, text)?.text_content();
        let mut plain = String::with_capacity(content.len());
        for line in content.lines() {
            plain.push_str(line.trim());
            plain.push('\n');
        }
        Ok(plain)
    }
}
