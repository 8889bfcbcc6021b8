//! Defines the [`Config`] for a blog and the logic for loading one from a
//! `zeptoblog.yaml` project file.
//!
//! A project file looks like this:
//!
//! ```yaml
//! title: My Blog
//! author: Someone
//! site_uri: https://blog.example.com/
//! source_root: src
//! output_root: out
//! posts_per_page: 10
//! footer_post: fragments/footer.xml
//! generators:
//!   glossary:
//!     type: com.io7m.zeptoblog.glossary
//!     file: glossary.properties
//! ```
//!
//! Relative paths are resolved against the directory containing the project
//! file.

use crate::markdown::COMMONMARK_FORMAT;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file [`Config::from_directory`] searches for.
pub const PROJECT_FILE: &str = "zeptoblog.yaml";

/// The default number of posts on each index page.
pub const DEFAULT_POSTS_PER_PAGE: usize = 10;

/// The optional XML fragments that can be spliced into every page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fragment {
    /// Replaces the whole page header.
    HeaderReplace,

    /// Inserted before the header's contents.
    HeaderPre,

    /// Appended after the header's contents.
    HeaderPost,

    /// Inserted before the footer's contents.
    FooterPre,

    /// Appended after the footer's contents.
    FooterPost,
}

impl Fragment {
    pub const ALL: [Fragment; 5] = [
        Fragment::HeaderReplace,
        Fragment::HeaderPre,
        Fragment::HeaderPost,
        Fragment::FooterPre,
        Fragment::FooterPost,
    ];
}

/// A request to run a generator before the blog is parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorRequest {
    /// The name the request is known by in the project file.
    pub name: String,

    /// The name of the generator to run, e.g. `com.io7m.zeptoblog.glossary`.
    pub generator_type: String,

    /// The properties file holding the generator's settings.
    pub properties_file: PathBuf,
}

/// Everything needed to compile a blog. Roots are always absolute.
#[derive(Clone, Debug)]
pub struct Config {
    title: String,
    author: String,
    site_uri: Url,
    source_root: PathBuf,
    output_root: PathBuf,
    posts_per_page: usize,
    format_default: String,
    fragments: BTreeMap<Fragment, PathBuf>,
    generator_requests: BTreeMap<String, GeneratorRequest>,
}

impl Config {
    /// Creates a configuration with default settings. Fails if `site_uri`
    /// isn't a valid absolute URI or either root is relative.
    pub fn new<T: Into<String>, A: Into<String>>(
        title: T,
        author: A,
        site_uri: &str,
        source_root: &Path,
        output_root: &Path,
    ) -> Result<Config> {
        let site_uri = Url::parse(site_uri)
            .map_err(|e| anyhow!("Invalid site URI `{}`: {}", site_uri, e))?;
        for (name, root) in &[("source", source_root), ("output", output_root)] {
            if !root.is_absolute() {
                return Err(anyhow!(
                    "The {} root `{}` must be an absolute path",
                    name,
                    root.display()
                ));
            }
        }
        Ok(Config {
            title: title.into(),
            author: author.into(),
            site_uri,
            source_root: source_root.to_owned(),
            output_root: output_root.to_owned(),
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
            format_default: COMMONMARK_FORMAT.to_owned(),
            fragments: BTreeMap::new(),
            generator_requests: BTreeMap::new(),
        })
    }

    /// Sets the number of posts per index page. Values below one become one.
    pub fn with_posts_per_page(mut self, posts_per_page: usize) -> Config {
        self.posts_per_page = posts_per_page.max(1);
        self
    }

    /// Sets the format used for posts that don't declare one.
    pub fn with_format_default<S: Into<String>>(mut self, format: S) -> Config {
        self.format_default = format.into();
        self
    }

    pub fn with_fragment(mut self, fragment: Fragment, path: PathBuf) -> Config {
        self.fragments.insert(fragment, path);
        self
    }

    pub fn with_generator_request(mut self, request: GeneratorRequest) -> Config {
        self.generator_requests.insert(request.name.clone(), request);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn site_uri(&self) -> &Url {
        &self.site_uri
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn posts_per_page(&self) -> usize {
        self.posts_per_page
    }

    pub fn format_default(&self) -> &str {
        &self.format_default
    }

    pub fn fragment(&self, fragment: Fragment) -> Option<&Path> {
        self.fragments.get(&fragment).map(|p| p.as_path())
    }

    pub fn generator_requests(&self) -> &BTreeMap<String, GeneratorRequest> {
        &self.generator_requests
    }

    /// Looks for a `zeptoblog.yaml` in `dir` or any of its ancestors and
    /// loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            match Config::from_project_file(&path) {
                Ok(config) => Ok(config),
                Err(e) => Err(anyhow!("Loading configuration: {:?}", e)),
            }
        } else {
            match dir.parent() {
                Some(dir) => Config::from_directory(dir),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    /// Loads the project file at `path`.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let path = std::fs::canonicalize(path)?;
        let project_root = path.parent().ok_or_else(|| {
            anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )
        })?;

        let mut config = Config::new(
            project.title,
            project.author,
            &project.site_uri,
            &project_root.join(project.source_root),
            &project_root.join(project.output_root),
        )?
        .with_posts_per_page(project.posts_per_page.0);

        if let Some(format) = project.format_default {
            config = config.with_format_default(format);
        }
        let fragments = [
            (Fragment::HeaderReplace, project.header_replace),
            (Fragment::HeaderPre, project.header_pre),
            (Fragment::HeaderPost, project.header_post),
            (Fragment::FooterPre, project.footer_pre),
            (Fragment::FooterPost, project.footer_post),
        ];
        for (fragment, file) in fragments {
            if let Some(file) = file {
                config = config.with_fragment(fragment, project_root.join(file));
            }
        }
        for (name, generator) in project.generators {
            config = config.with_generator_request(GeneratorRequest {
                name,
                generator_type: generator.generator_type,
                properties_file: project_root.join(generator.file),
            });
        }
        Ok(config)
    }
}

fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

#[derive(Deserialize)]
struct PageSize(usize);

impl Default for PageSize {
    fn default() -> Self {
        PageSize(DEFAULT_POSTS_PER_PAGE)
    }
}

#[derive(Deserialize)]
struct GeneratorEntry {
    #[serde(rename = "type")]
    generator_type: String,
    file: PathBuf,
}

#[derive(Deserialize)]
struct Project {
    title: String,
    author: String,
    site_uri: String,
    source_root: PathBuf,
    output_root: PathBuf,

    #[serde(default)]
    posts_per_page: PageSize,

    #[serde(default)]
    format_default: Option<String>,

    #[serde(default)]
    header_replace: Option<PathBuf>,

    #[serde(default)]
    header_pre: Option<PathBuf>,

    #[serde(default)]
    header_post: Option<PathBuf>,

    #[serde(default)]
    footer_pre: Option<PathBuf>,

    #[serde(default)]
    footer_post: Option<PathBuf>,

    #[serde(default)]
    generators: BTreeMap<String, GeneratorEntry>,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_relative_roots() {
        assert!(Config::new("T", "A", "http://example.com/", Path::new("src"), Path::new("/out")).is_err());
        assert!(Config::new("T", "A", "http://example.com/", Path::new("/src"), Path::new("out")).is_err());
        assert!(Config::new("T", "A", "not a uri", Path::new("/src"), Path::new("/out")).is_err());
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = Config::new("T", "A", "http://example.com/", Path::new("/src"), Path::new("/out"))?;
        assert_eq!(config.posts_per_page(), DEFAULT_POSTS_PER_PAGE);
        assert_eq!(config.format_default(), COMMONMARK_FORMAT);
        assert!(Fragment::ALL.iter().all(|f| config.fragment(*f).is_none()));
        assert_eq!(config.with_posts_per_page(0).posts_per_page(), 1);
        Ok(())
    }

    #[test]
    fn test_from_directory_searches_ancestors() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "title: My Blog\n\
             author: Someone\n\
             site_uri: https://blog.example.com/\n\
             source_root: src\n\
             output_root: /tmp/zeptoblog-out\n\
             posts_per_page: 5\n\
             footer_post: fragments/footer.xml\n\
             generators:\n  \
               glossary:\n    \
                 type: com.io7m.zeptoblog.glossary\n    \
                 file: glossary.properties\n",
        )?;
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested)?;

        let config = Config::from_directory(&nested)?;
        let root = fs::canonicalize(dir.path())?;
        assert_eq!(config.title(), "My Blog");
        assert_eq!(config.site_uri().as_str(), "https://blog.example.com/");
        assert_eq!(config.source_root(), root.join("src"));
        assert_eq!(config.output_root(), Path::new("/tmp/zeptoblog-out"));
        assert_eq!(config.posts_per_page(), 5);
        assert_eq!(
            config.fragment(Fragment::FooterPost),
            Some(root.join("fragments/footer.xml").as_path())
        );
        assert_eq!(config.fragment(Fragment::HeaderPre), None);
        let request = &config.generator_requests()["glossary"];
        assert_eq!(request.generator_type, "com.io7m.zeptoblog.glossary");
        assert_eq!(request.properties_file, root.join("glossary.properties"));
        Ok(())
    }

    #[test]
    fn test_missing_project_file() -> Result<()> {
        let dir = TempDir::new()?;
        assert!(Config::from_project_file(&dir.path().join(PROJECT_FILE)).is_err());
        Ok(())
    }
}
