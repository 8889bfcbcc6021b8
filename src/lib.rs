//! The library code for the `zeptoblog` static blog compiler. A blog is
//! compiled in three stages, each of which collects every problem it finds
//! rather than stopping at the first one ([`crate::error`]):
//!
//! 1. Running generators ([`crate::generator`]), which write synthetic posts
//!    such as a glossary ([`crate::glossary`]) into the source tree
//! 2. Parsing every `.zbp` post under the source root into a [`blog::Blog`]
//!    ([`crate::parser`], [`crate::blog`])
//! 3. Rendering the blog ([`crate::write`]): paginated index pages, one
//!    permalink page per post, a yearly index, an Atom feed
//!    ([`crate::feed`]), and a copy of every other source file
//!
//! Post bodies are written in one of several formats ([`crate::format`]).
//! Each format turns a body into an XHTML tree ([`crate::xml`]) for the
//! pages and into plain text for feed excerpts. CommonMark
//! ([`crate::markdown`]) and raw XHTML ([`crate::xhtml`]) are built in.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod blog;
pub mod build;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod generator;
pub mod glossary;
pub mod htmlrenderer;
pub mod markdown;
pub mod page;
pub mod parser;
pub mod post;
pub mod write;
pub mod xhtml;
pub mod xml;
