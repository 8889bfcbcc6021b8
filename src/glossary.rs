//! The built-in glossary generator. It reads one `.zbp` file per term from a
//! directory and assembles them into a single XHTML post, grouped by initial
//! letter with anchors for every letter and term.
//!
//! A term file looks like this:
//!
//! ```text
//! term Abstract syntax tree
//! related Parser Grammar
//! format com.io7m.zeptoblog.commonmark
//!
//! A tree representation of the structure of source code.
//! ```

use crate::config::Config;
use crate::error::{syntax_message, Error, ErrorKind, Result};
use crate::format::FormatRegistry;
use crate::generator::{Generator, Properties};
use crate::parser::SourceReader;
use crate::post::{Post, PostBody, POST_EXTENSION};
use crate::xhtml::XHTML_FORMAT;
use crate::xml::Element;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

/// The name of the glossary generator.
pub const GLOSSARY_GENERATOR: &str = "com.io7m.zeptoblog.glossary";

/// The property naming the directory of term files.
pub const SOURCE_DIR_PROPERTY: &str = "com.io7m.zeptoblog.glossary.source_dir";

/// The property naming the post file to generate.
pub const OUTPUT_FILE_PROPERTY: &str = "com.io7m.zeptoblog.glossary.output_file";

/// A single glossary term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlossaryItem {
    pub term: String,

    /// Terms to link to from this one.
    pub see_also: BTreeSet<String>,

    pub body: PostBody,

    /// The file the item was read from.
    pub path: PathBuf,
}

impl GlossaryItem {
    /// The anchor id of the item's heading.
    pub fn target_id(&self) -> String {
        target_id(&self.term)
    }
}

/// The anchor id for `term`: lower-cased, with runs of whitespace replaced
/// by `_`.
pub fn target_id(term: &str) -> String {
    term.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Parses a single glossary term file. The header accepts `term`,
/// `related`, and `format` commands; `term` is required.
pub fn parse_item<R: BufRead>(
    formats: &FormatRegistry,
    path: &Path,
    default_format: &str,
    reader: R,
) -> Result<GlossaryItem> {
    let mut source = SourceReader::new(path, reader);
    let mut term: Option<String> = None;
    let mut see_also = BTreeSet::new();
    let mut format: Option<String> = None;

    source.read_header(|source, line, tokens| match tokens[0] {
        "term" => {
            if tokens.len() >= 2 {
                term = Some(tokens[1..].join(" "));
            } else {
                source.fail(ErrorKind::Syntax, syntax_message("term <text> <text>*", line));
            }
        }
        "related" => {
            if tokens.len() >= 2 {
                see_also = tokens[1..].iter().map(|t| t.to_string()).collect();
            } else {
                source.fail(
                    ErrorKind::Syntax,
                    syntax_message("related <term> <term>*", line),
                );
            }
        }
        "format" => {
            if tokens.len() == 2 {
                if formats.resolve(tokens[1]).is_none() {
                    source.fail(
                        ErrorKind::Semantic,
                        format!("Unrecognized format: {}", tokens[1]),
                    );
                }
                format = Some(tokens[1].to_owned());
            } else {
                source.fail(ErrorKind::Syntax, syntax_message("format <format-name>", line));
            }
        }
        _ => source.fail(ErrorKind::Syntax, format!("Unrecognized command: {}", line)),
    });

    let term = match term {
        Some(term) => term,
        None => {
            source.fail(ErrorKind::Semantic, "Term not specified");
            return Err(source.into_errors());
        }
    };
    if source.has_errors() {
        return Err(source.into_errors());
    }

    let text = source.read_body();
    let format = format.unwrap_or_else(|| default_format.to_owned());
    source.finish(GlossaryItem {
        term,
        see_also,
        body: PostBody::new(format, text),
        path: path.to_owned(),
    })
}

/// Parses every `.zbp` file under `source_dir`, keyed by term. Two files
/// defining the same term is an error.
pub fn parse_glossary(
    formats: &FormatRegistry,
    source_dir: &Path,
    default_format: &str,
) -> Result<BTreeMap<String, GlossaryItem>> {
    let mut items: BTreeMap<String, GlossaryItem> = BTreeMap::new();
    let mut errors = Vec::new();

    for result in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                errors.push(Error::walk(source_dir, e));
                continue;
            }
        };
        let file = entry.path();
        if entry.file_type().is_dir()
            || file.extension().map_or(true, |ext| ext != POST_EXTENSION)
        {
            continue;
        }

        debug!("glossary item: {}", file.display());
        let reader = match File::open(file) {
            Ok(f) => BufReader::new(f),
            Err(e) => {
                errors.push(Error::io(file, e));
                continue;
            }
        };
        match parse_item(formats, file, default_format, reader) {
            Ok(item) => {
                if items.contains_key(&item.term) {
                    errors.push(
                        Error::new(
                            ErrorKind::Duplicate,
                            format!("Duplicate glossary item.\n  Term: {}", item.term),
                        )
                        .in_file(file),
                    );
                } else {
                    items.insert(item.term.clone(), item);
                }
            }
            Err(e) => errors.extend(e),
        }
    }

    match errors.is_empty() {
        true => Ok(items),
        false => Err(errors),
    }
}

/// Generates a glossary post from a directory of term files.
pub struct GlossaryGenerator {
    formats: Rc<FormatRegistry>,
}

impl GlossaryGenerator {
    pub fn new(formats: Rc<FormatRegistry>) -> GlossaryGenerator {
        GlossaryGenerator { formats }
    }

    /// Builds the glossary markup: one block per initial letter, each
    /// holding its terms in order.
    fn transform(&self, items: &BTreeMap<String, GlossaryItem>) -> Result<Element> {
        let mut by_letter: BTreeMap<String, Vec<&GlossaryItem>> = BTreeMap::new();
        for item in items.values() {
            let letter: String = item.term.chars().take(1).flat_map(char::to_uppercase).collect();
            by_letter.entry(letter).or_default().push(item);
        }

        let mut container = Element::xhtml("div");
        let mut errors = Vec::new();
        for (letter, items) in &by_letter {
            trace!("glossary letter {} ({} terms)", letter, items.len());
            let mut e_letter = Element::xhtml("div")
                .with_attribute("class", "zb_glossary_letter")
                .with_child(heading("h2", &letter.to_lowercase(), letter));
            for item in items {
                match self.transform_item(item) {
                    Ok(e) => e_letter.push_element(e),
                    Err(e) => errors.extend(e),
                }
            }
            e_letter.push_element(Element::xhtml("hr"));
            container.push_element(e_letter);
        }

        match errors.is_empty() {
            true => Ok(container),
            false => Err(errors),
        }
    }

    fn transform_item(&self, item: &GlossaryItem) -> Result<Element> {
        trace!("glossary item {}", item.term);
        let format = self.formats.resolve(item.body.format()).ok_or_else(|| {
            vec![Error::new(
                ErrorKind::Semantic,
                format!("Unrecognized format: {}", item.body.format()),
            )
            .in_file(&item.path)]
        })?;
        let body = format.produce_xhtml(&item.path, item.body.text())?;

        let mut e = Element::xhtml("div")
            .with_attribute("class", "zb_glossary_item")
            .with_child(heading("h3", &item.target_id(), &item.term))
            .with_child(body);

        if !item.see_also.is_empty() {
            let mut related = Element::xhtml("div")
                .with_attribute("class", "zb_glossary_related")
                .with_text("See: ");
            for term in &item.see_also {
                related.push_element(
                    Element::xhtml("a")
                        .with_attribute("href", format!("#{}", target_id(term)))
                        .with_text(term.as_str()),
                );
                related.push_text(" ");
            }
            e.push_element(related);
        }
        Ok(e)
    }
}

/// A heading containing a self-referencing anchor.
fn heading(kind: &str, id: &str, text: &str) -> Element {
    Element::xhtml(kind).with_child(
        Element::xhtml("a")
            .with_attribute("href", format!("#{}", id))
            .with_attribute("id", id)
            .with_text(text),
    )
}

fn required<'p>(properties: &'p Properties, key: &str, errors: &mut Vec<Error>) -> Option<&'p str> {
    match properties.get(key) {
        Some(value) => Some(value.as_str()),
        None => {
            errors.push(Error::new(
                ErrorKind::Semantic,
                format!("Missing required property: {}", key),
            ));
            None
        }
    }
}

impl Generator for GlossaryGenerator {
    fn name(&self) -> &str {
        GLOSSARY_GENERATOR
    }

    fn description(&self) -> &str {
        "A glossary generator"
    }

    fn generate(&self, config: &Config, properties: &Properties) -> Result<BTreeMap<PathBuf, Post>> {
        let mut errors = Vec::new();
        let source_dir = required(properties, SOURCE_DIR_PROPERTY, &mut errors);
        let output_file = required(properties, OUTPUT_FILE_PROPERTY, &mut errors);
        let (source_dir, output_file) = match (source_dir, output_file) {
            (Some(s), Some(o)) => (Path::new(s), PathBuf::from(o)),
            _ => return Err(errors),
        };

        let items = parse_glossary(&self.formats, source_dir, config.format_default())?;
        let glossary = self.transform(&items)?;
        let text = glossary.to_xml_string().map_err(|e| vec![e])?;
        debug!("glossary: {} terms -> {}", items.len(), output_file.display());

        let post = Post::new(
            "Glossary",
            None,
            output_file.clone(),
            PostBody::new(XHTML_FORMAT, text),
        );
        let mut posts = BTreeMap::new();
        posts.insert(output_file, post);
        Ok(posts)
    }
}
