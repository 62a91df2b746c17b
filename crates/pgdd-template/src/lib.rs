//! Copy-source rendering for custom extraction queries
//!
//! This crate handles:
//! - Substituting `$name` / `${name}` placeholders from manifest variables
//! - Optionally rendering Jinja expressions (`{{ name }}`) instead
//! - Wrapping the result as a derived relation usable by `COPY`

pub mod placeholder;
pub mod renderer;

pub use placeholder::substitute;
pub use renderer::{QueryRenderer, TemplateError, TemplateSyntax, UndefinedPolicy};
