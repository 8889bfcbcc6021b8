//! Pluggable post body formats. A [`Format`] turns the raw text of a
//! [`crate::post::PostBody`] into an XHTML tree (for pages) or plain text (for
//! feed excerpts). The [`FormatRegistry`] maps format names to providers; it
//! is populated once at startup and only read afterwards.

use crate::error::Result;
use crate::markdown::CommonMarkFormat;
use crate::xhtml::XhtmlFormat;
use crate::xml::Element;
use std::collections::BTreeMap;
use std::path::Path;

/// A provider for one post body format.
pub trait Format {
    /// The unique name posts use to select this format, e.g.
    /// `com.io7m.zeptoblog.commonmark`.
    fn name(&self) -> &str;

    /// A short human-readable description.
    fn description(&self) -> &str;

    /// Converts `text` into an XHTML element whose children are the rendered
    /// body. `path` is only used to attribute errors.
    fn produce_xhtml(&self, path: &Path, text: &str) -> Result<Element>;

    /// Converts `text` into plain text with all markup removed.
    fn produce_plain(&self, path: &Path, text: &str) -> Result<String>;
}

/// The set of available [`Format`]s, keyed by name.
#[derive(Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Box<dyn Format>>,
}

impl FormatRegistry {
    /// Creates an empty registry.
    pub fn new() -> FormatRegistry {
        FormatRegistry::default()
    }

    /// Creates a registry holding the built-in CommonMark and XHTML formats.
    pub fn with_defaults() -> FormatRegistry {
        let mut registry = FormatRegistry::new();
        registry.register(Box::new(CommonMarkFormat));
        registry.register(Box::new(XhtmlFormat));
        registry
    }

    /// Adds `format`, replacing any previously registered format with the
    /// same name.
    pub fn register(&mut self, format: Box<dyn Format>) {
        self.formats.insert(format.name().to_owned(), format);
    }

    pub fn resolve(&self, name: &str) -> Option<&dyn Format> {
        self.formats.get(name).map(|f| f.as_ref())
    }

    /// All registered formats, ordered by name.
    pub fn available(&self) -> impl Iterator<Item = &dyn Format> {
        self.formats.values().map(|f| f.as_ref())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markdown::COMMONMARK_FORMAT;
    use crate::xhtml::XHTML_FORMAT;

    #[test]
    fn test_defaults() {
        let registry = FormatRegistry::with_defaults();
        let names: Vec<&str> = registry.available().map(|f| f.name()).collect();
        assert_eq!(names, vec![COMMONMARK_FORMAT, XHTML_FORMAT]);
        assert_eq!(
            registry.resolve(XHTML_FORMAT).map(|f| f.description()),
            Some("XHTML 1.0 Strict")
        );
        assert!(registry.resolve("com.example.nonexistent").is_none());
    }

    #[test]
    fn test_empty() {
        assert_eq!(FormatRegistry::new().available().count(), 0);
    }
}
