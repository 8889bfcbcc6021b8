//! Defines the [`Blog`] aggregate, the [`BlogBuilder`] used to assemble one
//! while checking for duplicates, and the [`BlogParser`] which builds a blog
//! from a source tree on disk.

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::format::FormatRegistry;
use crate::parser::PostParser;
use crate::post::{Post, DATE_FORMAT, POST_EXTENSION};
use chrono::{DateTime, Datelike, FixedOffset};
use log::{debug, info};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A complete, immutable set of posts keyed by their source-relative paths,
/// along with the blog's title. The date-ordered views are computed on
/// first use.
#[derive(Debug)]
pub struct Blog {
    title: String,
    posts: BTreeMap<PathBuf, Post>,
    by_date: OnceCell<BTreeMap<DateTime<FixedOffset>, PathBuf>>,
}

impl Blog {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn posts(&self) -> &BTreeMap<PathBuf, Post> {
        &self.posts
    }

    /// Dated posts keyed by date, oldest first. Undated posts are left out.
    /// If two posts share a timestamp, the one with the greater path wins.
    pub fn posts_by_date(&self) -> BTreeMap<&DateTime<FixedOffset>, &Post> {
        self.date_index()
            .iter()
            .filter_map(|(date, path)| self.posts.get(path).map(|post| (date, post)))
            .collect()
    }

    fn date_index(&self) -> &BTreeMap<DateTime<FixedOffset>, PathBuf> {
        self.by_date.get_or_init(|| {
            self.posts
                .values()
                .filter_map(|post| post.date().map(|date| (*date, post.path().to_owned())))
                .collect()
        })
    }

    /// Dated posts, most recent first.
    pub fn posts_newest_first(&self) -> Vec<&Post> {
        self.posts_by_date().into_values().rev().collect()
    }

    /// Splits the dated posts, most recent first, into pages of
    /// `posts_per_page` posts keyed by 0-based page number. The last page may
    /// be short. A `posts_per_page` of zero is treated as one.
    pub fn posts_grouped_by_page(&self, posts_per_page: usize) -> BTreeMap<usize, Vec<&Post>> {
        self.posts_newest_first()
            .chunks(posts_per_page.max(1))
            .enumerate()
            .map(|(i, chunk)| (i, chunk.to_vec()))
            .collect()
    }

    /// Dated posts grouped by the year of their date, most recent first
    /// within each year.
    pub fn posts_grouped_by_year(&self) -> BTreeMap<i32, Vec<&Post>> {
        let mut years: BTreeMap<i32, Vec<&Post>> = BTreeMap::new();
        for post in self.posts_newest_first() {
            if let Some(date) = post.date() {
                years.entry(date.year()).or_default().push(post);
            }
        }
        years
    }
}

/// Accumulates posts into a [`Blog`], rejecting posts whose path is already
/// taken.
pub struct BlogBuilder {
    title: String,
    posts: BTreeMap<PathBuf, Post>,
    errors: Vec<Error>,
}

impl BlogBuilder {
    pub fn new<S: Into<String>>(title: S) -> BlogBuilder {
        BlogBuilder {
            title: title.into(),
            posts: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Adds `post`, which was read from `source_file`. A post whose path is
    /// already present is discarded and recorded as an error.
    pub fn add(&mut self, post: Post, source_file: &Path) {
        if self.posts.contains_key(post.path()) {
            let message = format!(
                "Duplicate blog post.\n  Post title: {}\n  Post date: {}\n  Post path: {}",
                post.title(),
                post.date()
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_else(|| "(none)".to_owned()),
                post.path().display(),
            );
            self.errors
                .push(Error::new(ErrorKind::Duplicate, message).in_file(source_file));
            return;
        }
        self.posts.insert(post.path().to_owned(), post);
    }

    /// Records errors that should prevent the blog from being built.
    pub fn add_errors<I: IntoIterator<Item = Error>>(&mut self, errors: I) {
        self.errors.extend(errors);
    }

    /// Returns the blog, or every error recorded along the way.
    pub fn build(self) -> Result<Blog> {
        if !self.errors.is_empty() {
            return Err(self.errors);
        }
        Ok(Blog {
            title: self.title,
            posts: self.posts,
            by_date: OnceCell::new(),
        })
    }
}

/// Builds a [`Blog`] from every `.zbp` file under a configuration's source
/// root.
pub struct BlogParser<'a> {
    formats: &'a FormatRegistry,
}

impl<'a> BlogParser<'a> {
    pub fn new(formats: &'a FormatRegistry) -> BlogParser<'a> {
        BlogParser { formats }
    }

    /// Walks `config.source_root()` recursively and parses every post. A bad
    /// post doesn't stop the walk; its errors are collected and the blog is
    /// only returned if there are none at all.
    pub fn parse(&self, config: &Config) -> Result<Blog> {
        let root = config.source_root();
        let parser = PostParser::new(self.formats);
        let mut builder = BlogBuilder::new(config.title());

        for result in WalkDir::new(root).sort_by_file_name() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    builder.add_errors(Some(Error::walk(root, e)));
                    continue;
                }
            };
            let file = entry.path();
            if entry.file_type().is_dir()
                || file.extension().map_or(true, |ext| ext != POST_EXTENSION)
            {
                continue;
            }

            let relative = file.strip_prefix(root).unwrap_or(file);
            debug!("parse: {}", file.display());
            let reader = match File::open(file) {
                Ok(f) => BufReader::new(f),
                Err(e) => {
                    builder.add_errors(Some(Error::io(file, e)));
                    continue;
                }
            };
            match parser.parse(relative, config.format_default(), reader) {
                Ok(post) => builder.add(post, file),
                Err(errors) => builder.add_errors(errors),
            }
        }

        let blog = builder.build()?;
        info!("Parsed {} posts from {}", blog.posts().len(), root.display());
        Ok(blog)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::PostBody;
    use std::fs;
    use tempfile::TempDir;

    fn post(path: &str, date: Option<String>) -> Post {
        Post::new(
            format!("Post {}", path),
            date.map(|d| DateTime::parse_from_str(&d, DATE_FORMAT).unwrap()),
            PathBuf::from(path),
            PostBody::new("com.io7m.zeptoblog.commonmark", "Body\n"),
        )
    }

    /// A blog with `count` posts dated one month apart starting in January
    /// 2010, plus one undated post.
    fn blog(count: usize) -> Blog {
        let mut builder = BlogBuilder::new("Blog");
        for i in 0..count {
            let date = format!("{}-{:02}-01T00:00:00+0000", 2010 + i / 12, i % 12 + 1);
            builder.add(post(&format!("p{:03}.zbp", i), Some(date)), Path::new("x"));
        }
        builder.add(post("undated.zbp", None), Path::new("x"));
        builder.build().unwrap()
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let mut builder = BlogBuilder::new("Blog");
        builder.add(post("a.zbp", None), Path::new("/src/a.zbp"));
        builder.add(post("a.zbp", None), Path::new("/src/other/a.zbp"));
        assert_eq!(builder.posts.len(), 1);
        let errors = builder.build().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Duplicate);
        assert!(errors[0].message().starts_with("Duplicate blog post."));
        assert!(errors[0].message().contains("Post path: a.zbp"));
    }

    #[test]
    fn test_pagination() {
        for (count, per_page) in &[(0usize, 10usize), (1, 10), (10, 10), (23, 10), (23, 1), (7, 3)] {
            let blog = blog(*count);
            let pages = blog.posts_grouped_by_page(*per_page);
            assert_eq!(pages.len(), (count + per_page - 1) / per_page);
            for (index, posts) in &pages {
                if index + 1 < pages.len() {
                    assert_eq!(posts.len(), *per_page);
                }
            }
            let all: Vec<&Post> = pages.values().flatten().copied().collect();
            assert_eq!(all.len(), *count);
            for pair in all.windows(2) {
                assert!(pair[0].date() > pair[1].date());
            }
        }
    }

    #[test]
    fn test_zero_page_size_is_one() {
        assert_eq!(blog(3).posts_grouped_by_page(0).len(), 3);
    }

    #[test]
    fn test_years() {
        let blog = blog(30);
        let years = blog.posts_grouped_by_year();
        let keys: Vec<i32> = years.keys().copied().collect();
        assert_eq!(keys, vec![2010, 2011, 2012]);
        assert_eq!(years[&2010].len(), 12);
        assert_eq!(years[&2012].len(), 6);
        assert!(years[&2011][0].date() > years[&2011][11].date());
    }

    #[test]
    fn test_posts_by_date_skips_undated() {
        let blog = blog(2);
        assert_eq!(blog.posts().len(), 3);
        assert_eq!(blog.posts_by_date().len(), 2);
    }

    #[test]
    fn test_parse_tree() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("2017"))?;
        fs::write(dir.path().join("a.zbp"), "title A\n\nBody\n")?;
        fs::write(dir.path().join("2017/b.zbp"), "title B\ndate 2017-01-01T00:00:00+0000\n\nBody\n")?;
        fs::write(dir.path().join("2017/image.png"), "not a post")?;
        let config = Config::new("Blog", "Author", "http://example.com/", dir.path(), Path::new("/tmp/out")).unwrap();

        let formats = FormatRegistry::with_defaults();
        let blog = BlogParser::new(&formats).parse(&config).unwrap();
        let paths: Vec<&PathBuf> = blog.posts().keys().collect();
        assert_eq!(paths, vec![&PathBuf::from("2017/b.zbp"), &PathBuf::from("a.zbp")]);
        Ok(())
    }

    #[test]
    fn test_parse_collects_errors_from_every_file() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("a.zbp"), "")?;
        fs::write(dir.path().join("b.zbp"), "date 2010\n\n")?;
        fs::write(dir.path().join("c.zbp"), "title C\n\nBody\n")?;
        let config = Config::new("Blog", "Author", "http://example.com/", dir.path(), Path::new("/tmp/out")).unwrap();

        let formats = FormatRegistry::with_defaults();
        let errors = BlogParser::new(&formats).parse(&config).unwrap_err();
        let files: Vec<Option<&Path>> = errors.iter().map(|e| e.position().file.as_deref()).collect();
        assert!(files.contains(&Some(Path::new("a.zbp"))));
        assert!(files.contains(&Some(Path::new("b.zbp"))));
        assert!(!files.contains(&Some(Path::new("c.zbp"))));
        Ok(())
    }

    #[test]
    fn test_missing_root() {
        let config = Config::new(
            "Blog",
            "Author",
            "http://example.com/",
            Path::new("/nonexistent/zeptoblog/source"),
            Path::new("/tmp/out"),
        )
        .unwrap();
        let formats = FormatRegistry::with_defaults();
        let errors = BlogParser::new(&formats).parse(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::NoSuchFile);
        assert!(errors[0].cause().is_some());
    }
}
