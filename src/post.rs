//! Defines the [`Post`] and [`PostBody`] types: the parsed form of a single
//! `.zbp` source file. Posts are immutable once built; the `with_*` helpers
//! return modified copies.

use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// The timestamp pattern used in `date` header commands, e.g.
/// `2017-01-13T21:05:00+0000`.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// The short date pattern used when displaying post dates.
pub const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d";

/// The file extension of post source files.
pub const POST_EXTENSION: &str = "zbp";

/// The file extension of rendered pages.
pub const PAGE_EXTENSION: &str = "xhtml";

/// The unformatted body of a post along with the name of the format it is
/// written in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostBody {
    format: String,
    text: String,
}

impl PostBody {
    pub fn new<F: Into<String>, T: Into<String>>(format: F, text: T) -> PostBody {
        PostBody {
            format: format.into(),
            text: text.into(),
        }
    }

    /// The name of the format provider that understands [`PostBody::text`].
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A single blog post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    title: String,
    date: Option<DateTime<FixedOffset>>,
    path: PathBuf,
    body: PostBody,
}

impl Post {
    /// Builds a post. `path` is the location of the source file relative to
    /// the source root; it is the post's identity within a blog.
    pub fn new<T: Into<String>>(
        title: T,
        date: Option<DateTime<FixedOffset>>,
        path: PathBuf,
        body: PostBody,
    ) -> Post {
        Post {
            title: title.into(),
            date,
            path,
            body,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> Option<&DateTime<FixedOffset>> {
        self.date.as_ref()
    }

    /// The source path, relative to the source root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn body(&self) -> &PostBody {
        &self.body
    }

    pub fn with_title<T: Into<String>>(&self, title: T) -> Post {
        Post {
            title: title.into(),
            ..self.clone()
        }
    }

    pub fn with_date(&self, date: Option<DateTime<FixedOffset>>) -> Post {
        Post {
            date,
            ..self.clone()
        }
    }

    pub fn with_path(&self, path: PathBuf) -> Post {
        Post {
            path,
            ..self.clone()
        }
    }

    pub fn with_body(&self, body: PostBody) -> Post {
        Post {
            body,
            ..self.clone()
        }
    }

    /// Orders dated posts by date and places undated posts after all of
    /// them. Two undated posts compare equal.
    pub fn cmp_by_date(&self, other: &Post) -> Ordering {
        match (&self.date, &other.date) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// The path of the post's source file relative to the output root, with
    /// the `.zbp` extension swapped for `.xhtml`.
    pub fn permalink_path(&self) -> PathBuf {
        self.path.with_extension(PAGE_EXTENSION)
    }

    /// The absolute file the post's permalink page is written to.
    pub fn permalink_file(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.permalink_path())
    }

    /// The site-absolute link to the post's permalink page, e.g.
    /// `/2017/hello.xhtml`.
    pub fn permalink_link(&self) -> String {
        site_link(&self.permalink_path())
    }

    /// Writes the post back out in the `.zbp` source format. Parsing the
    /// result yields an equal post.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.body.text.len() + 128);
        out.push_str("title ");
        out.push_str(&self.title);
        out.push('\n');
        if let Some(date) = &self.date {
            out.push_str("date ");
            out.push_str(&date.format(DATE_FORMAT).to_string());
            out.push('\n');
        }
        out.push_str("format ");
        out.push_str(&self.body.format);
        out.push_str("\n\n");
        out.push_str(&self.body.text);
        out
    }
}

/// Turns a path relative to the output root into a site-absolute link,
/// one `/` per component.
pub fn site_link(relative: &Path) -> String {
    let mut link = String::new();
    for component in relative.components() {
        link.push('/');
        link.push_str(&component.as_os_str().to_string_lossy());
    }
    link
}

#[cfg(test)]
mod test {
    use super::*;

    fn post(path: &str, date: Option<&str>) -> Post {
        Post::new(
            "Title",
            date.map(|d| DateTime::parse_from_str(d, DATE_FORMAT).unwrap()),
            PathBuf::from(path),
            PostBody::new("com.io7m.zeptoblog.commonmark", "Hello.\n"),
        )
    }

    #[test]
    fn test_cmp_by_date_places_undated_last() {
        let early = post("a.zbp", Some("2010-01-01T00:00:00+0000"));
        let late = post("b.zbp", Some("2011-01-01T00:00:00+0000"));
        let undated = post("c.zbp", None);
        assert_eq!(early.cmp_by_date(&late), Ordering::Less);
        assert_eq!(late.cmp_by_date(&undated), Ordering::Less);
        assert_eq!(undated.cmp_by_date(&early), Ordering::Greater);
        assert_eq!(undated.cmp_by_date(&post("d.zbp", None)), Ordering::Equal);
    }

    #[test]
    fn test_permalinks() {
        let p = post("2017/hello.zbp", None);
        assert_eq!(p.permalink_link(), "/2017/hello.xhtml");
        assert_eq!(
            p.permalink_file(Path::new("/out")),
            PathBuf::from("/out/2017/hello.xhtml")
        );
    }

    #[test]
    fn test_serialize() {
        let p = post("a.zbp", Some("2017-01-13T21:05:00+0100"));
        assert_eq!(
            p.serialize(),
            "title Title\ndate 2017-01-13T21:05:00+0100\nformat com.io7m.zeptoblog.commonmark\n\nHello.\n"
        );
        assert_eq!(
            p.with_date(None).serialize(),
            "title Title\nformat com.io7m.zeptoblog.commonmark\n\nHello.\n"
        );
    }
}
