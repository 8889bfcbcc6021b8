//! The [`Renderer`], responsible for turning a [`Blog`] into XHTML pages, an
//! Atom feed, and a copy of the non-post source files under the output
//! root.

use crate::blog::Blog;
use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};
use crate::feed::{feed, write_feed};
use crate::format::FormatRegistry;
use crate::page::{footer_links_for_index, footer_links_for_post, Fragments, Page};
use crate::post::{Post, DISPLAY_DATE_FORMAT, PAGE_EXTENSION, POST_EXTENSION};
use crate::xml::Element;
use chrono::{DateTime, FixedOffset, Local};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

const RESET_CSS: &str = include_str!("resources/reset.css");
const STYLE_CSS: &str = include_str!("resources/style.css");

/// Writes every output file for a blog. Each output is produced
/// independently: a failure is recorded and rendering carries on with the
/// next one.
pub struct Renderer<'a> {
    config: &'a Config,
    formats: &'a FormatRegistry,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &'a Config, formats: &'a FormatRegistry) -> Renderer<'a> {
        Renderer { config, formats }
    }

    /// Renders `blog`, stamping pages with the current local time.
    pub fn render(&self, blog: &Blog) -> Result<()> {
        let now: DateTime<FixedOffset> = Local::now().into();
        self.render_at(blog, &now)
    }

    /// Renders `blog` using `now` as the render time.
    pub fn render_at(&self, blog: &Blog, now: &DateTime<FixedOffset>) -> Result<()> {
        let mut errors = Vec::new();
        let fragments = Fragments::load(self.config, &mut errors);
        let ctx = Context {
            fragments: &fragments,
            now,
        };

        let blocks = self.post_blocks(blog, &mut errors);
        self.write_index_pages(blog, &blocks, &ctx, &mut errors);
        self.write_permalink_pages(blog, &blocks, &ctx, &mut errors);
        if let Err(e) = self.write_yearly_page(blog, &ctx) {
            errors.extend(e);
        }
        if let Err(e) = self.write_feed(blog, &blocks, now) {
            errors.extend(e);
        }
        for (name, contents) in &[("reset.css", RESET_CSS), ("style.css", STYLE_CSS)] {
            let file = self.config.output_root().join(name);
            debug!("write {} -> {}", name, file.display());
            if let Err(e) = write_file(&file, contents.as_bytes()) {
                errors.push(e);
            }
        }
        self.copy_files(&mut errors);

        match errors.is_empty() {
            true => {
                info!("Rendered {} posts to {}", blog.posts().len(), self.config.output_root().display());
                Ok(())
            }
            false => Err(errors),
        }
    }

    /// Renders the block of every post once. Posts that fail are reported
    /// here and left out of the result.
    fn post_blocks<'b>(&self, blog: &'b Blog, errors: &mut Vec<Error>) -> Blocks<'b> {
        let mut blocks = BTreeMap::new();
        for post in blog.posts().values() {
            match self.post_block(post) {
                Ok(block) => {
                    blocks.insert(post.path(), block);
                }
                Err(e) => errors.extend(e),
            }
        }
        blocks
    }

    /// Writes `1.xhtml`, `2.xhtml`, ... each holding one page of posts, most
    /// recent first.
    fn write_index_pages(&self, blog: &Blog, blocks: &Blocks, ctx: &Context, errors: &mut Vec<Error>) {
        let pages = blog.posts_grouped_by_page(self.config.posts_per_page());
        for (index, posts) in &pages {
            let file = self
                .config
                .output_root()
                .join(format!("{}.{}", index + 1, PAGE_EXTENSION));
            let rendered: Option<Vec<&Element>> =
                posts.iter().map(|post| blocks.get(post.path())).collect();
            let rendered = match rendered {
                Some(rendered) => rendered,
                None => {
                    debug!("out: skipping {}", file.display());
                    continue;
                }
            };
            debug!("out: segmented {}", file.display());

            let title = format!("{}: Page {}/{}", self.config.title(), index + 1, pages.len());
            let mut page = self.page(ctx, &file, title);
            for block in rendered {
                page.content.push_element(block.clone());
            }
            page.footer
                .prepend_element(footer_links_for_index(*index, pages.len()));
            if let Err(e) = write_page(&file, &page) {
                errors.push(e);
            }
        }
    }

    /// Writes one page per post, dated or not, at its permalink.
    fn write_permalink_pages(&self, blog: &Blog, blocks: &Blocks, ctx: &Context, errors: &mut Vec<Error>) {
        for post in blog.posts().values() {
            let block = match blocks.get(post.path()) {
                Some(block) => block,
                None => continue,
            };
            let file = post.permalink_file(self.config.output_root());
            debug!("out: permalink {}", file.display());

            let title = format!("{}: {}", self.config.title(), post.title());
            let mut page = self.page(ctx, &file, title);
            page.content.push_element(block.clone());
            page.footer.prepend_element(footer_links_for_post());
            if let Err(e) = write_page(&file, &page) {
                errors.push(e);
            }
        }
    }

    /// Writes `yearly.xhtml`: a table of posts for each year, most recent
    /// year first.
    fn write_yearly_page(&self, blog: &Blog, ctx: &Context) -> Result<()> {
        let file = self.config.output_root().join("yearly.xhtml");
        debug!("out: yearly {}", file.display());

        let title = format!("{}: Posts by year", self.config.title());
        let mut page = self.page(ctx, &file, title);
        for (year, posts) in blog.posts_grouped_by_year().iter().rev() {
            let mut table = Element::xhtml("table");
            for post in posts {
                let date = post
                    .date()
                    .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
                    .unwrap_or_default();
                table.push_element(
                    Element::xhtml("tr")
                        .with_child(
                            Element::xhtml("td")
                                .with_attribute("class", "zb_post_date")
                                .with_text(date),
                        )
                        .with_child(Element::xhtml("td").with_child(
                            Element::xhtml("a")
                                .with_attribute("href", post.permalink_link())
                                .with_text(post.title()),
                        )),
                );
            }
            page.content.push_element(
                Element::xhtml("div")
                    .with_child(Element::xhtml("h3").with_text(year.to_string()))
                    .with_child(table),
            );
        }
        write_page(&file, &page).map_err(|e| vec![e])
    }

    /// Writes `blog.atom`. The feed is built in full before the file is
    /// touched, so a failure leaves any previous feed in place.
    fn write_feed(&self, blog: &Blog, blocks: &Blocks, now: &DateTime<FixedOffset>) -> Result<()> {
        let file = self.config.output_root().join("blog.atom");
        if blog
            .posts_newest_first()
            .iter()
            .any(|post| !blocks.contains_key(post.path()))
        {
            debug!("atom: skipping {}", file.display());
            return Ok(());
        }
        let feed = feed(self.config, self.formats, blog, now)?;

        debug!("atom: {}", file.display());
        create_parent(&file).map_err(|e| vec![e])?;
        let f = File::create(&file).map_err(|e| vec![Error::io(&file, e)])?;
        let mut w = BufWriter::new(f);
        write_feed(&feed, &mut w)
            .map_err(|errors| errors.into_iter().map(|e| e.in_file(&file)).collect::<Vec<_>>())?;
        w.flush().map_err(|e| vec![Error::io(&file, e)])
    }

    /// Mirrors every non-post file under the source root into the output
    /// root. Symbolic links are recreated rather than followed.
    fn copy_files(&self, errors: &mut Vec<Error>) {
        let source_root = self.config.source_root();
        let output_root = self.config.output_root();
        let walker = WalkDir::new(source_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != output_root);

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(Error::walk(source_root, e));
                    continue;
                }
            };
            let file = entry.path();
            if entry.file_type().is_dir()
                || file.extension().map_or(false, |ext| ext == POST_EXTENSION)
            {
                continue;
            }

            let relative = file.strip_prefix(source_root).unwrap_or(file);
            let output = output_root.join(relative);
            let copied = match entry.file_type().is_symlink() {
                true => copy_link(file, &output),
                false => {
                    debug!("copying {} -> {}", file.display(), output.display());
                    create_parent(&output)
                        .and_then(|_| fs::copy(file, &output).map_err(|e| Error::io(&output, e)))
                        .map(|_| ())
                }
            };
            if let Err(e) = copied {
                errors.push(e);
            }
        }
    }

    fn page(&self, ctx: &Context, file: &Path, title: String) -> Page {
        Page::new(self.config, ctx.fragments, file, title, ctx.now)
    }

    /// Renders a single post: a head with its date and permalink, the body
    /// produced by its format, and an empty foot.
    fn post_block(&self, post: &Post) -> Result<Element> {
        let source = self.config.source_root().join(post.path());
        let format = self.formats.resolve(post.body().format()).ok_or_else(|| {
            vec![Error::new(
                ErrorKind::Semantic,
                format!("Unrecognized format: {}", post.body().format()),
            )
            .in_file(&source)]
        })?;
        let content = format.produce_xhtml(&source, post.body().text())?;

        let mut head = Element::xhtml("div").with_attribute("class", "zb_post_head");
        if let Some(date) = post.date() {
            head.push_element(
                Element::xhtml("span")
                    .with_attribute("class", "zb_post_date")
                    .with_text(date.format(DISPLAY_DATE_FORMAT).to_string()),
            );
            head.push_text(" ");
        }
        head.push_element(
            Element::xhtml("span")
                .with_attribute("class", "zb_post_title")
                .with_child(
                    Element::xhtml("a")
                        .with_attribute("href", post.permalink_link())
                        .with_text(post.title()),
                ),
        );

        let mut body = Element::xhtml("div").with_attribute("class", "zb_post_body");
        body.children = content.children;

        Ok(Element::xhtml("div")
            .with_attribute("class", "zb_post")
            .with_child(head)
            .with_child(body)
            .with_child(Element::xhtml("div").with_attribute("class", "zb_post_foot")))
    }
}

/// The rendered block of each post, keyed by source path.
type Blocks<'b> = BTreeMap<&'b Path, Element>;

/// State shared by every page of one render.
struct Context<'c> {
    fragments: &'c Fragments,
    now: &'c DateTime<FixedOffset>,
}

fn write_page(file: &Path, page: &Page) -> std::result::Result<(), Error> {
    let document = page
        .to_document()
        .to_xhtml_document()
        .map_err(|e| e.in_file(file))?;
    write_file(file, document.as_bytes())
}

fn create_parent(file: &Path) -> std::result::Result<(), Error> {
    match file.parent() {
        Some(dir) => fs::create_dir_all(dir).map_err(|e| Error::io(dir, e)),
        None => Ok(()),
    }
}

/// Writes `contents` to `file`, creating parent directories as needed.
fn write_file(file: &Path, contents: &[u8]) -> std::result::Result<(), Error> {
    create_parent(file)?;
    let mut w = BufWriter::new(File::create(file).map_err(|e| Error::io(file, e))?);
    w.write_all(contents)
        .and_then(|_| w.flush())
        .map_err(|e| Error::io(file, e))
}

/// Recreates the symbolic link `source` at `output`, replacing whatever is
/// there.
fn copy_link(source: &Path, output: &Path) -> std::result::Result<(), Error> {
    let target = fs::read_link(source).map_err(|e| Error::io(source, e))?;
    debug!("link {} -> {}", output.display(), target.display());
    create_parent(output)?;
    match fs::remove_file(output) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(Error::io(output, e)),
        _ => {}
    }
    symlink(&target, output).map_err(|e| Error::io(output, e))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blog::BlogBuilder;
    use crate::post::{PostBody, DATE_FORMAT};
    use crate::xml;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_str("2020-06-01T12:00:00+0000", DATE_FORMAT).unwrap()
    }

    fn post(path: &str, date: Option<&str>, format: &str, text: &str) -> Post {
        Post::new(
            format!("Post {}", path),
            date.map(|d| DateTime::parse_from_str(d, DATE_FORMAT).unwrap()),
            PathBuf::from(path),
            PostBody::new(format, text),
        )
    }

    fn read(file: &Path) -> Element {
        let text = fs::read_to_string(file).unwrap();
        xml::parse(&text, file, 0).unwrap()
    }

    #[test]
    fn test_render() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("2017/images"))?;
        fs::write(source.join("2017/images/cat.png"), "meow")?;
        fs::write(source.join("README"), "readme")?;
        fs::write(source.join("2017/a.zbp"), "ignored")?;
        let config = Config::new("Blog", "Author", "http://example.com/", &source, &dir.path().join("out"))
            .unwrap()
            .with_posts_per_page(1);

        let mut builder = BlogBuilder::new("Blog");
        builder.add(post("2017/a.zbp", Some("2017-01-01T00:00:00+0000"), "com.io7m.zeptoblog.commonmark", "# Hello\n\nWorld.\n"), Path::new("x"));
        builder.add(post("2016/b.zbp", Some("2016-05-01T00:00:00+0000"), "com.io7m.zeptoblog.xhtml", "<p>Old</p>"), Path::new("x"));
        builder.add(post("about.zbp", None, "com.io7m.zeptoblog.commonmark", "About.\n"), Path::new("x"));
        let blog = builder.build().unwrap();

        let formats = FormatRegistry::with_defaults();
        Renderer::new(&config, &formats).render_at(&blog, &now()).unwrap();

        let out = config.output_root();
        for file in &[
            "1.xhtml", "2.xhtml", "2017/a.xhtml", "2016/b.xhtml", "about.xhtml",
            "yearly.xhtml", "blog.atom", "reset.css", "style.css", "README", "2017/images/cat.png",
        ] {
            assert!(out.join(file).exists(), "missing {}", file);
        }
        assert!(!out.join("3.xhtml").exists());
        assert!(!out.join("2017/a.zbp").exists());

        let first = read(&out.join("1.xhtml"));
        assert_eq!(first.find_all("title")[0].text_content(), "Blog: Page 1/2");
        let post = first
            .find_all("div")
            .into_iter()
            .find(|d| d.attribute("class") == Some("zb_post"))
            .unwrap();
        assert_eq!(post.find_all("a")[0].attribute("href"), Some("/2017/a.xhtml"));
        assert_eq!(post.find_all("h1")[0].attribute("id"), Some("hello"));

        let yearly = read(&out.join("yearly.xhtml"));
        let years: Vec<String> = yearly.find_all("h3").iter().map(|h| h.text_content()).collect();
        assert_eq!(years, vec!["2017", "2016"]);
        Ok(())
    }

    #[test]
    fn test_bad_post_skips_its_pages_only() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let config = Config::new("Blog", "Author", "http://example.com/", dir.path(), &dir.path().join("out")).unwrap();

        let mut builder = BlogBuilder::new("Blog");
        builder.add(post("good.zbp", None, "com.io7m.zeptoblog.commonmark", "Fine.\n"), Path::new("x"));
        builder.add(post("bad.zbp", None, "com.io7m.zeptoblog.xhtml", "<p>unclosed"), Path::new("x"));
        let blog = builder.build().unwrap();

        let formats = FormatRegistry::with_defaults();
        let errors = Renderer::new(&config, &formats).render_at(&blog, &now()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Transform);
        assert!(config.output_root().join("good.xhtml").exists());
        assert!(!config.output_root().join("bad.xhtml").exists());
        assert!(config.output_root().join("yearly.xhtml").exists());
        Ok(())
    }

    #[test]
    fn test_bad_post_is_reported_once() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("out");
        fs::create_dir_all(&out)?;
        fs::write(out.join("blog.atom"), "previous")?;
        let config = Config::new("Blog", "Author", "http://example.com/", dir.path(), &out).unwrap();

        let mut builder = BlogBuilder::new("Blog");
        builder.add(post("good.zbp", Some("2017-01-01T00:00:00+0000"), "com.io7m.zeptoblog.commonmark", "Fine.\n"), Path::new("x"));
        builder.add(post("bad.zbp", Some("2016-01-01T00:00:00+0000"), "com.io7m.zeptoblog.xhtml", "<p>unclosed</div>"), Path::new("x"));
        let blog = builder.build().unwrap();

        let formats = FormatRegistry::with_defaults();
        let errors = Renderer::new(&config, &formats).render_at(&blog, &now()).unwrap_err();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert_eq!(errors[0].position().file.as_deref(), Some(dir.path().join("bad.zbp").as_path()));
        assert!(out.join("good.xhtml").exists());
        assert!(!out.join("bad.xhtml").exists());
        assert!(!out.join("1.xhtml").exists());
        assert_eq!(fs::read_to_string(out.join("blog.atom"))?, "previous");
        Ok(())
    }

    /// Renders pages fine but has no plain text form.
    struct NoPlainFormat;

    impl crate::format::Format for NoPlainFormat {
        fn name(&self) -> &str {
            "com.example.noplain"
        }

        fn description(&self) -> &str {
            "No plain text"
        }

        fn produce_xhtml(&self, _path: &Path, text: &str) -> Result<Element> {
            Ok(Element::xhtml("div").with_child(Element::xhtml("p").with_text(text)))
        }

        fn produce_plain(&self, path: &Path, _text: &str) -> Result<String> {
            Err(vec![Error::new(ErrorKind::Transform, "No plain text").in_file(path)])
        }
    }

    #[test]
    fn test_failed_feed_keeps_previous_file() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("out");
        fs::create_dir_all(&out)?;
        fs::write(out.join("blog.atom"), "previous")?;
        let config = Config::new("Blog", "Author", "http://example.com/", dir.path(), &out).unwrap();

        let mut builder = BlogBuilder::new("Blog");
        builder.add(post("a.zbp", Some("2017-01-01T00:00:00+0000"), "com.example.noplain", "Text"), Path::new("x"));
        let blog = builder.build().unwrap();

        let mut formats = FormatRegistry::with_defaults();
        formats.register(Box::new(NoPlainFormat));
        let errors = Renderer::new(&config, &formats).render_at(&blog, &now()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "No plain text");
        assert!(out.join("1.xhtml").exists());
        assert!(out.join("a.xhtml").exists());
        assert_eq!(fs::read_to_string(out.join("blog.atom"))?, "previous");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_preserved() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("src");
        fs::create_dir_all(&source)?;
        fs::write(source.join("target.txt"), "hello")?;
        std::os::unix::fs::symlink("target.txt", source.join("link.txt"))?;
        let config = Config::new("Blog", "Author", "http://example.com/", &source, &dir.path().join("out")).unwrap();

        let blog = BlogBuilder::new("Blog").build().unwrap();
        let formats = FormatRegistry::with_defaults();
        Renderer::new(&config, &formats).render_at(&blog, &now()).unwrap();

        let link = config.output_root().join("link.txt");
        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_link(&link)?, PathBuf::from("target.txt"));
        Ok(())
    }
}
