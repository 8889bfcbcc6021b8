//! Support for creating the Atom feed from a [`Blog`].

use crate::blog::Blog;
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::format::FormatRegistry;
use crate::post::Post;
use atom_syndication::{Content, Entry, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset};
use std::io::Write;
use std::path::Path;

/// The length, in characters, entry excerpts are cut to.
pub const EXCERPT_LENGTH: usize = 72;

/// Writes `feed` to `w` as Atom XML.
pub fn write_feed<W: Write>(feed: &Feed, w: W) -> Result<()> {
    feed.write_to(w).map_err(|e| {
        vec![Error::new(ErrorKind::Io, format!("Could not write feed: {}", e))]
    })?;
    Ok(())
}

/// Builds the feed: one entry per dated post, most recent first. `now` is
/// used as the feed's update time when the blog has no dated posts.
pub fn feed(
    config: &Config,
    formats: &FormatRegistry,
    blog: &Blog,
    now: &DateTime<FixedOffset>,
) -> Result<Feed> {
    let posts = blog.posts_newest_first();

    let mut feed = Feed::default();
    feed.set_title(blog.title());
    feed.set_subtitle(Some(Text::plain("Atom feed")));
    feed.set_id(config.site_uri().as_str());
    feed.set_links(vec![alternate(config.site_uri().as_str())]);
    feed.set_authors(vec![author(config)]);
    feed.set_updated(posts.first().and_then(|p| p.date()).copied().unwrap_or(*now));
    feed.set_entries(feed_entries(config, formats, &posts)?);
    Ok(feed)
}

fn feed_entries(config: &Config, formats: &FormatRegistry, posts: &[&Post]) -> Result<Vec<Entry>> {
    let mut entries: Vec<Entry> = Vec::with_capacity(posts.len());
    let mut errors = Vec::new();

    for post in posts {
        let date = match post.date() {
            Some(date) => *date,
            None => continue,
        };
        let excerpt = match excerpt(config, formats, post) {
            Ok(excerpt) => excerpt,
            Err(e) => {
                errors.extend(e);
                continue;
            }
        };

        // Permalinks are site-absolute paths; the feed wants full URLs.
        let link = config
            .site_uri()
            .join(&post.permalink_link())
            .map(|url| url.to_string())
            .unwrap_or_else(|_| post.permalink_link());

        let mut content = Content::default();
        content.set_content_type(Some("text".to_owned()));
        content.set_value(Some(excerpt));

        let mut entry = Entry::default();
        entry.set_id(link.as_str());
        entry.set_title(post.title());
        entry.set_updated(date);
        entry.set_published(Some(date));
        entry.set_authors(vec![author(config)]);
        entry.set_links(vec![alternate(&link)]);
        entry.set_content(Some(content));
        entries.push(entry);
    }

    match errors.is_empty() {
        true => Ok(entries),
        false => Err(errors),
    }
}

fn excerpt(config: &Config, formats: &FormatRegistry, post: &Post) -> Result<String> {
    let source: &Path = &config.source_root().join(post.path());
    let format = formats.resolve(post.body().format()).ok_or_else(|| {
        vec![Error::new(
            ErrorKind::Semantic,
            format!("Unrecognized format: {}", post.body().format()),
        )
        .in_file(source)]
    })?;
    let plain = format.produce_plain(source, post.body().text())?;
    Ok(ellipsize(&plain, EXCERPT_LENGTH))
}

fn alternate(href: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel("alternate");
    link
}

fn author(config: &Config) -> Person {
    let mut person = Person::default();
    person.set_name(config.author());
    person
}

/// Cuts `text` to at most `max` characters, appending `...` if anything was
/// removed.
pub fn ellipsize(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_owned(),
    }
}
