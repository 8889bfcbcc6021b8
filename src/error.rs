//! Defines the [`Error`] type shared by every stage of the pipeline. Stages
//! never stop at the first problem: they collect as many [`Error`]s as they
//! can and hand the whole list back to the caller (see [`Result`]).

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// The result of a pipeline stage: either a value or a non-empty list of
/// [`Error`]s.
pub type Result<T> = std::result::Result<T, Vec<Error>>;

/// The underlying cause of an [`Error`], if any.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad categories of [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A malformed header command.
    Syntax,

    /// A missing required field, or a name that doesn't resolve to a format,
    /// generator, or property.
    Semantic,

    /// Two posts (or glossary terms) claiming the same key.
    Duplicate,

    /// A file or directory that doesn't exist.
    NoSuchFile,

    /// Any other I/O failure.
    Io,

    /// Malformed body markup surfaced through a format provider.
    Transform,
}

/// The location an [`Error`] refers to. Lines are 1-based; a line of `0`
/// means the error isn't attached to a particular line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LexicalPosition {
    pub line: u32,
    pub column: u32,
    pub file: Option<PathBuf>,
}

impl LexicalPosition {
    pub fn new(line: u32, column: u32, file: Option<PathBuf>) -> LexicalPosition {
        LexicalPosition { line, column, file }
    }

    /// A position that only names a file.
    pub fn of_file(file: &Path) -> LexicalPosition {
        LexicalPosition::new(0, 0, Some(file.to_owned()))
    }
}

/// A single problem found while generating, parsing, or rendering a blog.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    position: LexicalPosition,
    cause: Option<Cause>,
}

impl Error {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            message: message.into(),
            position: LexicalPosition::default(),
            cause: None,
        }
    }

    /// Attaches a position to the error.
    pub fn at(mut self, position: LexicalPosition) -> Error {
        self.position = position;
        self
    }

    /// Attaches a file (without line information) to the error.
    pub fn in_file(self, file: &Path) -> Error {
        self.at(LexicalPosition::of_file(file))
    }

    /// Attaches an underlying cause to the error.
    pub fn caused_by<E>(mut self, cause: E) -> Error
    where
        E: Into<Cause>,
    {
        self.cause = Some(cause.into());
        self
    }

    /// Converts an I/O failure on `path` into an [`Error`]. Missing files
    /// are reported as [`ErrorKind::NoSuchFile`] so callers can tell them
    /// apart from other I/O problems.
    pub fn io(path: &Path, err: io::Error) -> Error {
        let (kind, prefix) = match err.kind() {
            io::ErrorKind::NotFound => (ErrorKind::NoSuchFile, "No such file"),
            _ => (ErrorKind::Io, "I/O error"),
        };
        Error::new(kind, format!("{}: {}", prefix, err))
            .in_file(path)
            .caused_by(err)
    }

    /// Converts a [`walkdir::Error`] raised while traversing a directory
    /// tree. `root` is used when the error doesn't carry a path of its own.
    pub fn walk(root: &Path, err: walkdir::Error) -> Error {
        let path = err.path().unwrap_or(root).to_owned();
        match err.into_io_error() {
            Some(io_err) => Error::io(&path, io_err),
            None => Error::new(ErrorKind::Io, "I/O error: filesystem loop detected")
                .in_file(&path),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> &LexicalPosition {
        &self.position
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as `file:line:column: message (cause)`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(file) = &self.position.file {
            write!(f, "{}:", file.display())?;
        }
        write!(
            f,
            "{}:{}: {}",
            self.position.line, self.position.column, self.message
        )?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Builds the multi-line message used for every malformed header command.
pub(crate) fn syntax_message(expected: &str, received: &str) -> String {
    format!(
        "Syntax error.\n  Expected: {}\n  Received: {}\n",
        expected, received
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_with_file_and_cause() {
        let err = Error::io(
            Path::new("/x/y.zbp"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(
            err.to_string(),
            "/x/y.zbp:0:0: I/O error: denied (denied)"
        );
    }

    #[test]
    fn test_missing_file_is_distinguished() {
        let err = Error::io(
            Path::new("/nope"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::NoSuchFile);
        assert!(err.message().starts_with("No such file"));
    }

    #[test]
    fn test_display_without_file() {
        let err = Error::new(ErrorKind::Semantic, "Title not specified")
            .at(LexicalPosition::new(3, 0, None));
        assert_eq!(err.to_string(), "3:0: Title not specified");
    }
}
