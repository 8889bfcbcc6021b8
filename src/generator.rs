//! Generators synthesize extra posts before the blog is parsed. Each
//! [`GeneratorRequest`] in the configuration names a [`Generator`] and a
//! properties file; the [`GeneratorExecutor`] runs them all and writes their
//! posts into the source tree, where the blog parser picks them up like any
//! hand-written post.

use crate::config::{Config, GeneratorRequest};
use crate::error::{Error, ErrorKind, Result};
use crate::format::FormatRegistry;
use crate::glossary::GlossaryGenerator;
use crate::post::Post;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The key/value settings handed to a generator.
pub type Properties = HashMap<String, String>;

/// A provider of synthesized posts.
pub trait Generator {
    /// The unique name requests use to select this generator.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Produces posts keyed by the file they should be written to. Relative
    /// keys are resolved against the configuration's source root.
    fn generate(&self, config: &Config, properties: &Properties) -> Result<BTreeMap<PathBuf, Post>>;
}

/// The set of available [`Generator`]s, keyed by name.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Box<dyn Generator>>,
}

impl GeneratorRegistry {
    pub fn new() -> GeneratorRegistry {
        GeneratorRegistry::default()
    }

    /// Creates a registry holding the built-in glossary generator, which
    /// renders term bodies through `formats`.
    pub fn with_defaults(formats: Rc<FormatRegistry>) -> GeneratorRegistry {
        let mut registry = GeneratorRegistry::new();
        registry.register(Box::new(GlossaryGenerator::new(formats)));
        registry
    }

    pub fn register(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.name().to_owned(), generator);
    }

    pub fn resolve(&self, name: &str) -> Option<&dyn Generator> {
        self.generators.get(name).map(|g| g.as_ref())
    }

    /// All registered generators, ordered by name.
    pub fn available(&self) -> impl Iterator<Item = &dyn Generator> {
        self.generators.values().map(|g| g.as_ref())
    }
}

/// Runs every generator request in a configuration.
pub struct GeneratorExecutor<'a> {
    generators: &'a GeneratorRegistry,
}

impl<'a> GeneratorExecutor<'a> {
    pub fn new(generators: &'a GeneratorRegistry) -> GeneratorExecutor<'a> {
        GeneratorExecutor { generators }
    }

    /// Runs each request in turn. A failing request doesn't prevent the
    /// others from running; all errors are returned together.
    pub fn execute_all(&self, config: &Config) -> Result<()> {
        let mut errors = Vec::new();
        for request in config.generator_requests().values() {
            if let Err(e) = self.execute(config, request) {
                errors.extend(e);
            }
        }
        match errors.is_empty() {
            true => {
                info!("Executed {} generators", config.generator_requests().len());
                Ok(())
            }
            false => Err(errors),
        }
    }

    fn execute(&self, config: &Config, request: &GeneratorRequest) -> Result<()> {
        let generator = self.generators.resolve(&request.generator_type).ok_or_else(|| {
            vec![Error::new(
                ErrorKind::Semantic,
                format!("No such generator: {}", request.generator_type),
            )
            .in_file(&request.properties_file)]
        })?;

        debug!("generator {}: {}", request.name, request.generator_type);
        let properties = load_properties(&request.properties_file).map_err(|e| vec![e])?;
        let posts = generator.generate(config, &properties)?;

        let errors: Vec<Error> = posts
            .iter()
            .filter_map(|(path, post)| {
                write_post(&config.source_root().join(path), post).err()
            })
            .collect();
        match errors.is_empty() {
            true => Ok(()),
            false => Err(errors),
        }
    }
}

/// Reads a Java-style `.properties` file.
pub fn load_properties(path: &Path) -> std::result::Result<Properties, Error> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    java_properties::read(BufReader::new(file)).map_err(|e| {
        Error::new(ErrorKind::Io, format!("I/O error: {}", e))
            .in_file(path)
            .caused_by(e)
    })
}

/// Serializes `post` into `file`, creating parent directories as needed.
fn write_post(file: &Path, post: &Post) -> std::result::Result<(), Error> {
    debug!("generate: {}", file.display());
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    let mut w = BufWriter::new(File::create(file).map_err(|e| Error::io(file, e))?);
    w.write_all(post.serialize().as_bytes())
        .and_then(|_| w.flush())
        .map_err(|e| Error::io(file, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::PostBody;
    use tempfile::TempDir;

    struct Fixed;

    impl Generator for Fixed {
        fn name(&self) -> &str {
            "com.example.fixed"
        }

        fn description(&self) -> &str {
            "Fixed posts"
        }

        fn generate(&self, _: &Config, properties: &Properties) -> Result<BTreeMap<PathBuf, Post>> {
            let path = PathBuf::from(&properties["output"]);
            let post = Post::new(
                "Generated",
                None,
                path.clone(),
                PostBody::new("com.io7m.zeptoblog.xhtml", "<p>Hi</p>\n"),
            );
            Ok(vec![(path, post)].into_iter().collect())
        }
    }

    fn request(name: &str, generator_type: &str, properties_file: PathBuf) -> GeneratorRequest {
        GeneratorRequest {
            name: name.to_owned(),
            generator_type: generator_type.to_owned(),
            properties_file,
        }
    }

    #[test]
    fn test_execute_all() -> std::io::Result<()> {
        let dir = TempDir::new()?;
        let properties = dir.path().join("fixed.properties");
        fs::write(&properties, "output = generated/fixed.zbp\n")?;

        let mut registry = GeneratorRegistry::new();
        registry.register(Box::new(Fixed));
        let config = Config::new("T", "A", "http://example.com/", dir.path(), &dir.path().join("out"))
            .unwrap()
            .with_generator_request(request("bad", "com.example.missing", properties.clone()))
            .with_generator_request(request("good", "com.example.fixed", properties));

        let errors = GeneratorExecutor::new(&registry).execute_all(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "No such generator: com.example.missing");

        let written = fs::read_to_string(dir.path().join("generated/fixed.zbp"))?;
        assert_eq!(
            written,
            "title Generated\nformat com.io7m.zeptoblog.xhtml\n\n<p>Hi</p>\n"
        );
        Ok(())
    }

    #[test]
    fn test_missing_properties_file() {
        let err = load_properties(Path::new("/nonexistent/x.properties")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSuchFile);
    }

    #[test]
    fn test_defaults() {
        let registry = GeneratorRegistry::with_defaults(Rc::new(FormatRegistry::with_defaults()));
        let names: Vec<&str> = registry.available().map(|g| g.name()).collect();
        assert_eq!(names, vec!["com.io7m.zeptoblog.glossary"]);
    }
}
