//! Implements a custom [`push_html`] that renders CommonMark into markup that
//! is also well-formed XML, so the result can be re-parsed into an
//! [`crate::xml::Element`]. It differs from [`pulldown_cmark::html::push_html`]
//! in a few ways:
//!
//! * Fenced and indented code blocks both become a bare `<pre>` element.
//! * Void elements are self-closed (`<br />`, `<hr />`, `<img ... />`) and
//!   images carry their alt text in the `alt` attribute.
//! * Headings get `id` attributes taken from a precomputed list so they can
//!   be linked to.
//! * No named entities are produced, since XHTML parsers don't know them.

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, Event, LinkType, Tag};
use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::io;

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(&'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

struct EscapeHtml<'a>(&'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

/// Writes ` title="..."` unless the title is empty.
struct TitleAttribute<'a>(&'a str);

impl Display for TitleAttribute<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.is_empty() {
            true => Ok(()),
            false => write!(f, r#" title="{}""#, EscapeHtml(self.0)),
        }
    }
}

enum TableState {
    Head,
    Body,
}

/// An image whose start tag has been seen. Everything up to the matching end
/// tag is alt text.
struct PendingImage {
    dest: String,
    title: String,
    alt: String,
    depth: usize,
}

/// Renders markdown [`Event`]s into XHTML. This is largely modeled after
/// [`pulldown_cmark`]'s private [`HtmlWriter`
/// struct](https://github.com/raphlinus/pulldown-cmark/blob/bf0a1a4938dbd2ec41c3add069b3d361d11731f4/src/html.rs#L36-L50).
pub(crate) struct HtmlRenderer {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// The `id`s to give headings, in document order.
    heading_ids: VecDeque<String>,

    image: Option<PendingImage>,
}

impl<'a> HtmlRenderer {
    pub(crate) fn new(heading_ids: Vec<String>) -> Self {
        HtmlRenderer {
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            heading_ids: heading_ids.into(),
            image: None,
        }
    }

    pub(crate) fn on_event<W: StrWrite>(&mut self, w: &mut W, event: Event<'a>) -> io::Result<()> {
        if self.image.is_some() {
            return self.on_image_event(w, event);
        }
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Code(code) => write!(w, "<code>{}</code>", EscapeHtml(&code)),
            Event::FootnoteReference(name) => write!(
                w,
                r##"<sup class="footnote-reference"><a href="#{}">{}</a></sup>"##,
                EscapeHtml(&name),
                EscapeHtml(&name),
            ),
            Event::HardBreak => w.write_str("<br />\n"),
            Event::Html(html) => w.write_str(&html),
            Event::Rule => w.write_str("<hr />\n"),
            Event::SoftBreak => w.write_str("\n"),
            Event::TaskListMarker(checked) => write!(
                w,
                r#"<input disabled="disabled" type="checkbox"{} />"#,
                match checked {
                    true => r#" checked="checked""#,
                    false => "",
                }
            ),
            Event::Text(text) => escape_html(w, &text),
        }
    }

    fn on_image_event<W: StrWrite>(&mut self, w: &mut W, event: Event<'a>) -> io::Result<()> {
        let image = match self.image.as_mut() {
            Some(image) => image,
            None => return Ok(()),
        };
        match event {
            Event::Start(Tag::Image(..)) => image.depth += 1,
            Event::End(Tag::Image(..)) if image.depth > 0 => image.depth -= 1,
            Event::End(Tag::Image(..)) => {
                if let Some(image) = self.image.take() {
                    write!(
                        w,
                        r#"<img src="{}" alt="{}"{} />"#,
                        EscapeHref(&image.dest),
                        EscapeHtml(&image.alt),
                        TitleAttribute(&image.title),
                    )?;
                }
            }
            Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
            Event::SoftBreak | Event::HardBreak => image.alt.push(' '),
            _ => {}
        }
        Ok(())
    }

    fn on_start<W: StrWrite>(&mut self, w: &mut W, tag: Tag<'a>) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(_) => w.write_str("<pre>"),
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => {
                let name = EscapeHtml(&name);
                write!(
                    w,
                    r#"<div class="footnote-definition" id="{}"><sup class="footnote-definition-label">{}</sup>"#,
                    &name, &name,
                )
            }
            Tag::Heading(level) => match self.heading_ids.pop_front() {
                Some(id) => write!(w, r#"<h{} id="{}">"#, level, EscapeHtml(&id)),
                None => write!(w, "<h{}>", level),
            },
            Tag::Image(_link_type, dest, title) => {
                self.image = Some(PendingImage {
                    dest: dest.to_string(),
                    title: title.to_string(),
                    alt: String::new(),
                    depth: 0,
                });
                Ok(())
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(LinkType::Email, dest, title) => write!(
                w,
                r#"<a href="mailto:{}"{}>"#,
                EscapeHref(&dest),
                TitleAttribute(&title),
            ),
            Tag::Link(_link_type, dest, title) => write!(
                w,
                r#"<a href="{}"{}>"#,
                EscapeHref(&dest),
                TitleAttribute(&title),
            ),
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => write!(w, "<ol start=\"{}\">\n", start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" style="text-align: left""#,
                    Some(Alignment::Right) => r#" style="text-align: right""#,
                    Some(Alignment::Center) => r#" style="text-align: center""#,
                    _ => "",
                }
            ),
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => w.write_str("</pre>\n"),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Heading(level) => write!(w, "</h{}>\n", level),
            Tag::Image(..) => Ok(()), // handled by on_image_event
            Tag::Item => w.write_str("</li>\n"),
            Tag::Link(..) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>")
            }
            Tag::TableRow => w.write_str("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }
}

/// Converts [`Event`]s into an XHTML string. `heading_ids` are assigned to
/// headings in order; headings beyond the end of the list get no `id`.
pub fn push_html<'a, I>(out: &mut String, events: I, heading_ids: Vec<String>) -> io::Result<()>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut renderer = HtmlRenderer::new(heading_ids);
    for event in events {
        renderer.on_event(out, event)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pulldown_cmark::Parser;

    fn render(markdown: &str) -> String {
        let mut out = String::new();
        push_html(&mut out, Parser::new(markdown), vec!["first".to_owned()]).unwrap();
        out
    }

    #[test]
    fn test_code_blocks_are_bare_pre() {
        assert_eq!(render("```rust\nfn x() {}\n```\n"), "<pre>fn x() {}\n</pre>\n");
        assert_eq!(render("    a < b\n"), "<pre>a &lt; b\n</pre>\n");
    }

    #[test]
    fn test_void_elements_are_closed() {
        assert_eq!(render("a  \nb\n"), "<p>a<br />\nb</p>\n");
        assert_eq!(render("***\n"), "<hr />\n");
        assert_eq!(
            render("![the *alt*](/x.png \"T\")\n"),
            "<p><img src=\"/x.png\" alt=\"the alt\" title=\"T\" /></p>\n"
        );
    }

    #[test]
    fn test_heading_ids() {
        assert_eq!(
            render("# One\n\n## Two\n"),
            "<h1 id=\"first\">One</h1>\n<h2>Two</h2>\n"
        );
    }

    #[test]
    fn test_links() {
        assert_eq!(
            render("[x](/a?b=1&c=2)\n"),
            "<p><a href=\"/a?b=1&amp;c=2\">x</a></p>\n"
        );
    }
}
