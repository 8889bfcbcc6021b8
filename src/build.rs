//! Exports the [`compile`] function which stitches together the high-level
//! steps of building a blog: running generators ([`crate::generator`]),
//! parsing the posts ([`crate::blog`]), and rendering the output tree
//! ([`crate::write`]).

use crate::blog::BlogParser;
use crate::config::Config;
use crate::error::Result;
use crate::format::FormatRegistry;
use crate::generator::{GeneratorExecutor, GeneratorRegistry};
use crate::write::Renderer;
use log::info;
use std::rc::Rc;

/// Compiles the blog described by `config` with the built-in formats and
/// generators. See [`compile_with`].
pub fn compile(config: &Config) -> Result<()> {
    let formats = Rc::new(FormatRegistry::with_defaults());
    let generators = GeneratorRegistry::with_defaults(Rc::clone(&formats));
    compile_with(config, &formats, &generators)
}

/// Runs the generators, parses the blog, and renders it. Each stage only
/// runs if the previous one reported no errors; anything written before a
/// failure is left on disk.
pub fn compile_with(
    config: &Config,
    formats: &FormatRegistry,
    generators: &GeneratorRegistry,
) -> Result<()> {
    GeneratorExecutor::new(generators).execute_all(config)?;
    let blog = BlogParser::new(formats).parse(config)?;
    Renderer::new(config, formats).render(&blog)?;
    info!("Compiled {}", config.title());
    Ok(())
}
