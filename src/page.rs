//! The skeleton shared by every rendered page, and the optional XML
//! [`Fragments`] spliced into it.

use crate::config::{Config, Fragment};
use crate::error::Error;
use crate::post::{site_link, DATE_FORMAT, PAGE_EXTENSION};
use crate::xml::{self, Element};
use chrono::{DateTime, FixedOffset};
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The fragments named in a [`Config`], parsed once per render.
#[derive(Debug, Default)]
pub struct Fragments {
    elements: BTreeMap<Fragment, Element>,
}

impl Fragments {
    /// Loads every configured fragment. A fragment that can't be read or
    /// parsed is reported in `errors` and treated as absent.
    pub fn load(config: &Config, errors: &mut Vec<Error>) -> Fragments {
        let mut elements = BTreeMap::new();
        for fragment in Fragment::ALL {
            if let Some(path) = config.fragment(fragment) {
                match load_fragment(path) {
                    Ok(element) => {
                        elements.insert(fragment, element);
                    }
                    Err(e) => errors.push(e),
                }
            }
        }
        Fragments { elements }
    }

    /// A fresh copy of `fragment`, if it was loaded.
    fn get(&self, fragment: Fragment) -> Option<Element> {
        self.elements.get(&fragment).cloned()
    }
}

fn load_fragment(path: &Path) -> Result<Element, Error> {
    debug!("fragment: {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    xml::parse(&text, path, 0)
}

/// A page under construction. The header, content, and footer are kept
/// apart so the renderer can add to each; [`Page::to_document`] assembles
/// them.
#[derive(Clone, Debug)]
pub struct Page {
    title: String,

    /// The `zb_header` block, or the header-replace fragment.
    pub header: Element,

    /// The `zb_body` block holding the page's posts.
    pub content: Element,

    /// The `zb_footer` block holding the signature and timestamp table.
    pub footer: Element,
}

impl Page {
    /// Builds the skeleton of the page that will be written to `file` (an
    /// absolute path under the output root), with the configured fragments
    /// spliced in.
    pub fn new<T: Into<String>>(
        config: &Config,
        fragments: &Fragments,
        file: &Path,
        title: T,
        updated: &DateTime<FixedOffset>,
    ) -> Page {
        let mut header = match fragments.get(Fragment::HeaderReplace) {
            Some(replacement) => replacement,
            None => Element::xhtml("div")
                .with_attribute("class", "zb_header")
                .with_attribute("id", "zb_header")
                .with_child(
                    Element::xhtml("h1").with_child(
                        Element::xhtml("a")
                            .with_attribute("href", "/")
                            .with_text(config.title()),
                    ),
                ),
        };
        if let Some(pre) = fragments.get(Fragment::HeaderPre) {
            header.prepend_element(pre);
        }
        if let Some(post) = fragments.get(Fragment::HeaderPost) {
            header.push_element(post);
        }

        let mut footer = footer(config.output_root(), file, updated);
        if let Some(pre) = fragments.get(Fragment::FooterPre) {
            footer.prepend_element(pre);
        }
        if let Some(post) = fragments.get(Fragment::FooterPost) {
            footer.push_element(post);
        }

        Page {
            title: title.into(),
            header,
            content: Element::xhtml("div")
                .with_attribute("class", "zb_body")
                .with_attribute("id", "zb_body"),
            footer,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Assembles the complete `<html>` element.
    pub fn to_document(&self) -> Element {
        Element::xhtml("html").with_child(head(&self.title)).with_child(
            Element::xhtml("body")
                .with_child(self.header.clone())
                .with_child(self.content.clone())
                .with_child(self.footer.clone()),
        )
    }
}

fn head(title: &str) -> Element {
    let stylesheet = |href: &str| {
        Element::xhtml("link")
            .with_attribute("rel", "stylesheet")
            .with_attribute("type", "text/css")
            .with_attribute("href", href)
    };

    Element::xhtml("head")
        .with_child(
            Element::xhtml("meta")
                .with_attribute("http-equiv", "Content-Type")
                .with_attribute("content", "application/xhtml+xml; charset=UTF-8"),
        )
        .with_child(
            Element::xhtml("meta")
                .with_attribute("name", "generator")
                .with_attribute(
                    "content",
                    format!(
                        "https://github.com/io7m/zeptoblog; version={}",
                        env!("CARGO_PKG_VERSION")
                    ),
                ),
        )
        .with_child(Element::xhtml("title").with_text(title))
        .with_child(stylesheet("/reset.css"))
        .with_child(stylesheet("/style.css"))
        .with_child(
            Element::xhtml("link")
                .with_attribute("rel", "alternate")
                .with_attribute("type", "application/atom+xml")
                .with_attribute("href", "/blog.atom"),
        )
}

fn footer(output_root: &Path, file: &Path, updated: &DateTime<FixedOffset>) -> Element {
    let signature = file.strip_prefix(output_root).unwrap_or(file);
    let mut link = site_link(signature);
    let mut name = signature
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if signature.extension().map_or(false, |ext| ext == PAGE_EXTENSION) {
        link.push_str(".asc");
        name.push_str(".asc");
    }

    let row = |label: &str, value: Element| {
        Element::xhtml("tr")
            .with_child(Element::xhtml("td").with_text(label))
            .with_child(value)
    };

    let table = Element::xhtml("table")
        .with_child(row(
            "Signed:",
            Element::xhtml("td").with_child(
                Element::xhtml("a")
                    .with_attribute("href", link)
                    .with_text(name),
            ),
        ))
        .with_child(row(
            "Updated:",
            Element::xhtml("td").with_text(updated.format(DATE_FORMAT).to_string()),
        ));

    Element::xhtml("div")
        .with_attribute("class", "zb_footer")
        .with_attribute("id", "zb_footer")
        .with_child(table)
}

fn footer_links() -> Element {
    Element::xhtml("div").with_attribute("id", "zb_footer_links")
}

fn footer_links_by_year() -> Element {
    Element::xhtml("div").with_child(
        Element::xhtml("a")
            .with_attribute("href", "/yearly.xhtml")
            .with_text("Posts by year"),
    )
}

/// The footer links for a permalink or yearly page: just the "Posts by
/// year" link.
pub fn footer_links_for_post() -> Element {
    footer_links().with_child(footer_links_by_year())
}

/// The footer links for index page `current` (0-based) of `count`. Every
/// other page is linked; the current one is plain text.
pub fn footer_links_for_index(current: usize, count: usize) -> Element {
    let mut pages = Element::xhtml("div").with_text("Posts by page: ");
    for index in 0..count {
        let human = (index + 1).to_string();
        if index == current {
            pages.push_text(human);
        } else {
            pages.push_element(
                Element::xhtml("a")
                    .with_attribute("href", format!("/{}.{}", human, PAGE_EXTENSION))
                    .with_text(human),
            );
        }
        pages.push_text(" ");
    }
    footer_links()
        .with_child(footer_links_by_year())
        .with_child(pages)
}
