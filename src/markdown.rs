//! The CommonMark body format. Markdown is rendered by
//! [`crate::htmlrenderer`] into an XHTML fragment which is then re-parsed into
//! an [`Element`], so the rest of the pipeline never sees raw markup.

use crate::error::{Error, ErrorKind, Result};
use crate::format::Format;
use crate::htmlrenderer::push_html;
use crate::post::{PAGE_EXTENSION, POST_EXTENSION};
use crate::xml::{self, Element, XHTML_NAMESPACE};
use pulldown_cmark::*;
use slug::slugify;
use std::collections::HashMap;
use std::path::Path;
use url::{ParseError as UrlParseError, Url};

/// The name posts use to select CommonMark bodies.
pub const COMMONMARK_FORMAT: &str = "com.io7m.zeptoblog.commonmark";

/// The CommonMark [`Format`] provider.
pub struct CommonMarkFormat;

impl Format for CommonMarkFormat {
    fn name(&self) -> &str {
        COMMONMARK_FORMAT
    }

    fn description(&self) -> &str {
        "CommonMark"
    }

    fn produce_xhtml(&self, path: &Path, text: &str) -> Result<Element> {
        let mut document = format!("<div xmlns=\"{}\">\n", XHTML_NAMESPACE);
        to_xhtml(&mut document, text).map_err(|e| {
            vec![Error::new(ErrorKind::Transform, "Could not render CommonMark")
                .in_file(path)
                .caused_by(e)]
        })?;
        document.push_str("</div>\n");
        xml::parse(&document, path, 1).map_err(|e| vec![e])
    }

    fn produce_plain(&self, _path: &Path, text: &str) -> Result<String> {
        Ok(to_plain(text))
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts markdown to an XHTML fragment, appending the result to `out`.
/// Relative links to other posts (`other.zbp`) are rewritten to point at
/// their permalink pages (`other.xhtml`).
pub fn to_xhtml(out: &mut String, markdown: &str) -> std::io::Result<()> {
    let events: Vec<Event> = Parser::new_ext(markdown, options())
        .map(|ev| EventConverter.convert(ev))
        .collect();
    let ids = heading_ids(&events);
    push_html(out, events.into_iter(), ids)
}

/// Extracts the plain text of a markdown document: the inline text of each
/// top-level paragraph, each followed by a blank line. Everything else
/// (headings, lists, code blocks, ...) is dropped.
pub fn to_plain(markdown: &str) -> String {
    let mut text = String::new();
    let mut depth = 0usize;
    let mut in_paragraph = false;

    for event in Parser::new_ext(markdown, options()) {
        match event {
            Event::Start(Tag::Paragraph) if depth == 0 => {
                in_paragraph = true;
                depth += 1;
            }
            Event::End(Tag::Paragraph) if depth == 1 && in_paragraph => {
                in_paragraph = false;
                depth -= 1;
                text.push_str("\n\n");
            }
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Computes an `id` for every heading, in document order. Ids are the
/// slugified heading text; repeats get a `-1`, `-2`, ... suffix.
fn heading_ids(events: &[Event]) -> Vec<String> {
    let mut ids = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut current: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::Heading(_)) => current = Some(String::new()),
            Event::Text(t) | Event::Code(t) => {
                if let Some(heading) = current.as_mut() {
                    heading.push_str(t);
                }
            }
            Event::End(Tag::Heading(_)) => {
                if let Some(heading) = current.take() {
                    let base = heading_slug(&heading);
                    let count = seen.entry(base.clone()).or_insert(0);
                    ids.push(match *count {
                        0 => base,
                        n => format!("{}-{}", base, n),
                    });
                    *count += 1;
                }
            }
            _ => {}
        }
    }
    ids
}

fn heading_slug(heading: &str) -> String {
    match slugify(heading) {
        slug if slug.is_empty() => "id".to_owned(),
        slug => slug,
    }
}

struct EventConverter;

impl EventConverter {
    fn convert_tag<'b>(&self, tag: Tag<'b>) -> Tag<'b> {
        match tag {
            // Links between posts are written against the source tree
            // (`foo.zbp`) and need to point at the rendered page instead.
            Tag::Link(
                link @ (LinkType::Inline
                | LinkType::Reference
                | LinkType::ReferenceUnknown
                | LinkType::Shortcut
                | LinkType::Collapsed
                | LinkType::CollapsedUnknown),
                url,
                title,
            ) => match convert_link(&url) {
                Some(converted) => Tag::Link(link, CowStr::Boxed(converted.into_boxed_str()), title),
                None => Tag::Link(link, url, title),
            },
            _ => tag,
        }
    }

    fn convert<'b>(&self, ev: Event<'b>) -> Event<'b> {
        match ev {
            Event::Start(tag) => Event::Start(self.convert_tag(tag)),
            Event::End(tag) => Event::End(self.convert_tag(tag)),
            _ => ev,
        }
    }
}

/// Rewrites a relative link to a `.zbp` file so it ends in `.xhtml`,
/// keeping any query or fragment. Returns `None` for links that need no
/// rewriting.
fn convert_link(link: &str) -> Option<String> {
    match Url::parse(link) {
        Err(UrlParseError::RelativeUrlWithoutBase) => {}
        _ => return None,
    }
    let split = link.find(|c: char| c == '?' || c == '#').unwrap_or(link.len());
    let (path, rest) = link.split_at(split);
    let stem = path.strip_suffix(&format!(".{}", POST_EXTENSION))?;
    Some(format!("{}.{}{}", stem, PAGE_EXTENSION, rest))
}
