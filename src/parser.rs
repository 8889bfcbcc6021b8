//! Defines the [`PostParser`], which reads a single `.zbp` post, and the
//! header machinery it shares with the glossary item parser.
//!
//! A post source file looks like this:
//!
//! ```text
//! title An example post
//! date 2017-01-13T21:05:00+0000
//! format com.io7m.zeptoblog.commonmark
//!
//! The body starts after the first blank line.
//! ```
//!
//! Each header line is a command followed by whitespace-separated arguments.
//! The header ends at the first blank line. Errors in the header are
//! accumulated line by line; if there are any, the body is never read.

use crate::error::{syntax_message, Error, ErrorKind, LexicalPosition, Result};
use crate::format::FormatRegistry;
use crate::post::{Post, PostBody, DATE_FORMAT};
use chrono::DateTime;
use log::debug;
use std::io::BufRead;
use std::path::Path;

/// Reads a source file line by line, tracking the current line number and
/// collecting errors against it.
pub(crate) struct SourceReader<'a, R> {
    reader: R,
    path: &'a Path,
    line: u32,
    io_failed: bool,
    errors: Vec<Error>,
}

impl<'a, R: BufRead> SourceReader<'a, R> {
    pub(crate) fn new(path: &'a Path, reader: R) -> SourceReader<'a, R> {
        SourceReader {
            reader,
            path,
            line: 0,
            io_failed: false,
            errors: Vec::new(),
        }
    }

    pub(crate) fn position(&self) -> LexicalPosition {
        LexicalPosition::new(self.line, 0, Some(self.path.to_owned()))
    }

    /// Records an error at the current line.
    pub(crate) fn fail<S: Into<String>>(&mut self, kind: ErrorKind, message: S) {
        let err = Error::new(kind, message).at(self.position());
        self.errors.push(err);
    }

    pub(crate) fn push_error(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Reads the next line without its terminator. `None` at end of input.
    /// I/O failures are recorded and treated as end of input.
    fn next_line(&mut self) -> Option<String> {
        self.line += 1;
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => {
                if buf.ends_with('\n') {
                    buf.pop();
                    if buf.ends_with('\r') {
                        buf.pop();
                    }
                }
                Some(buf)
            }
            Err(e) => {
                let err = Error::io(self.path, e).at(self.position());
                self.errors.push(err);
                self.io_failed = true;
                None
            }
        }
    }

    /// Reads header lines up to (and including) the first blank line,
    /// calling `command` with each trimmed line and its whitespace-separated
    /// tokens. Reaching the end of input first is an error.
    pub(crate) fn read_header<F>(&mut self, mut command: F)
    where
        F: FnMut(&mut Self, &str, &[&str]),
    {
        loop {
            let raw = match self.next_line() {
                Some(raw) => raw,
                None => {
                    if !self.io_failed {
                        self.fail(ErrorKind::Syntax, "Unexpected EOF");
                    }
                    return;
                }
            };
            let line = raw.trim();
            if line.is_empty() {
                return;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            command(self, line, &tokens);
        }
    }

    /// Reads the rest of the input, terminating every line with `\n`.
    pub(crate) fn read_body(&mut self) -> String {
        let mut body = String::new();
        while let Some(line) = self.next_line() {
            body.push_str(&line);
            body.push('\n');
        }
        body
    }

    /// Returns `value` if no errors were recorded, or the errors otherwise.
    pub(crate) fn finish<T>(self, value: T) -> Result<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    pub(crate) fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

/// Parses [`Post`]s from `.zbp` source text.
pub struct PostParser<'a> {
    /// Used to check that declared formats exist.
    formats: &'a FormatRegistry,
}

impl<'a> PostParser<'a> {
    pub fn new(formats: &'a FormatRegistry) -> PostParser<'a> {
        PostParser { formats }
    }

    /// Parses a single post. `path` is the post's path relative to the
    /// source root; it becomes the post's identity and is attached to every
    /// error. Posts that don't declare a format get `default_format`.
    pub fn parse<R: BufRead>(&self, path: &Path, default_format: &str, reader: R) -> Result<Post> {
        let mut source = SourceReader::new(path, reader);
        let mut title: Option<String> = None;
        let mut date = None;
        let mut format: Option<String> = None;

        source.read_header(|source, line, tokens| match tokens[0] {
            "title" => {
                if tokens.len() >= 2 {
                    title = Some(tokens[1..].join(" "));
                } else {
                    source.fail(
                        ErrorKind::Syntax,
                        syntax_message("title <text> <text>*", line),
                    );
                }
            }
            "date" => {
                if tokens.len() == 2 {
                    match DateTime::parse_from_str(tokens[1], DATE_FORMAT) {
                        Ok(d) => date = Some(d),
                        Err(e) => {
                            let err = Error::new(
                                ErrorKind::Syntax,
                                format!("Could not parse date '{}': {}", tokens[1], e),
                            )
                            .at(source.position())
                            .caused_by(e);
                            source.push_error(err);
                        }
                    }
                } else {
                    source.fail(ErrorKind::Syntax, syntax_message("date <date>", line));
                }
            }
            "format" => {
                if tokens.len() == 2 {
                    if self.formats.resolve(tokens[1]).is_none() {
                        source.fail(
                            ErrorKind::Semantic,
                            format!("Unrecognized format: {}", tokens[1]),
                        );
                    }
                    format = Some(tokens[1].to_owned());
                } else {
                    source.fail(
                        ErrorKind::Syntax,
                        syntax_message("format <format-name>", line),
                    );
                }
            }
            _ => source.fail(ErrorKind::Syntax, format!("Unrecognized command: {}", line)),
        });

        let title = match title {
            Some(title) => title,
            None => {
                source.fail(ErrorKind::Semantic, "Title not specified");
                return Err(source.into_errors());
            }
        };
        if source.has_errors() {
            return Err(source.into_errors());
        }

        let body = source.read_body();
        debug!("parsed post {} ({})", path.display(), title);
        let format = format.unwrap_or_else(|| default_format.to_owned());
        source.finish(Post::new(
            title,
            date,
            path.to_owned(),
            PostBody::new(format, body),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markdown::COMMONMARK_FORMAT;
    use crate::xhtml::XHTML_FORMAT;
    use std::path::PathBuf;

    fn parse(input: &str) -> Result<Post> {
        let formats = FormatRegistry::with_defaults();
        PostParser::new(&formats).parse(Path::new("a/b.zbp"), COMMONMARK_FORMAT, input.as_bytes())
    }

    fn messages(result: Result<Post>) -> Vec<String> {
        match result {
            Ok(post) => panic!("Unexpectedly parsed: {:?}", post),
            Err(errors) => errors.iter().map(|e| e.message().to_owned()).collect(),
        }
    }

    #[test]
    fn test_parse_full_header() -> Result<()> {
        let post = parse(
            "title  An   example\ndate 2017-01-13T21:05:00+0000\nformat com.io7m.zeptoblog.xhtml\n\n<p>Hi</p>\r\nBye",
        )?;
        assert_eq!(post.title(), "An example");
        assert_eq!(
            post.date().map(|d| d.format(DATE_FORMAT).to_string()),
            Some("2017-01-13T21:05:00+0000".to_owned())
        );
        assert_eq!(post.path(), Path::new("a/b.zbp"));
        assert_eq!(post.body().format(), XHTML_FORMAT);
        assert_eq!(post.body().text(), "<p>Hi</p>\nBye\n");
        Ok(())
    }

    #[test]
    fn test_parse_default_format() -> Result<()> {
        let post = parse("title Hello\n   \nBody\n")?;
        assert_eq!(post.body().format(), COMMONMARK_FORMAT);
        assert!(post.date().is_none());
        assert_eq!(post.body().text(), "Body\n");
        Ok(())
    }

    #[test]
    fn test_empty_file() {
        let messages = messages(parse(""));
        assert!(messages.iter().any(|m| m == "Unexpected EOF"));
    }

    #[test]
    fn test_header_without_blank_line() {
        let errors = match parse("title X\n") {
            Err(errors) => errors,
            Ok(_) => panic!("expected errors"),
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Unexpected EOF");
        assert_eq!(errors[0].position().line, 2);
    }

    #[test]
    fn test_missing_title() {
        let messages = messages(parse("date 2017-01-13T21:05:00+0000\n\nBody\n"));
        assert_eq!(messages, vec!["Title not specified".to_owned()]);
    }

    #[test]
    fn test_date_arity() {
        for header in &["date", "date 2017-01-13T21:05:00+0000 extra"] {
            let messages = messages(parse(&format!("title T\n{}\n\n", header)));
            assert_eq!(messages.len(), 1);
            assert!(messages[0].contains("Syntax error"), "{}", messages[0]);
        }
    }

    #[test]
    fn test_bad_date_names_input() {
        let messages = messages(parse("title T\ndate 2010\n\n"));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("2010"));
    }

    #[test]
    fn test_errors_accumulate_with_lines() {
        let result = parse("title\nformat\nbogus command\n\nBody\n");
        let errors = match result {
            Err(errors) => errors,
            Ok(_) => panic!("expected errors"),
        };
        let lines: Vec<u32> = errors.iter().map(|e| e.position().line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
        assert!(errors[0].message().contains("Expected: title <text> <text>*"));
        assert!(errors[1].message().contains("Expected: format <format-name>"));
        assert!(errors[2].message().starts_with("Unrecognized command"));
        assert_eq!(errors[3].message(), "Title not specified");
        assert_eq!(
            errors[0].position().file.as_deref(),
            Some(PathBuf::from("a/b.zbp").as_path())
        );
    }

    #[test]
    fn test_unknown_format() {
        let messages = messages(parse("title T\nformat com.example.nope\n\n"));
        assert_eq!(messages, vec!["Unrecognized format: com.example.nope".to_owned()]);
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let post = parse("title Round trip\ndate 2016-02-29T12:30:45-0500\nformat com.io7m.zeptoblog.xhtml\n\n<p>x</p>\n\n<p>y</p>\n")?;
        let again = parse(&post.serialize())?;
        assert_eq!(post, again);
        Ok(())
    }
}
