//! stencil renderer
//!
//! Evaluates a parsed template against JSON-like data.
//!
//! ```text
//! Template AST + Value → Renderer::render() → RenderOutput { output, success, errors }
//! ```
//!
//! ```
//! use stencil_render::{render_str, Value};
//!
//! let data = Value::from(serde_json::json!({"name": "world"}));
//! let result = render_str("Hello {{ name | capitalize }}!", &data).unwrap();
//! assert_eq!(result.output, "Hello World!");
//! assert!(result.success);
//! ```

mod builtins;
pub mod filters;
pub mod renderer;
pub mod resolver;
pub mod value;

pub use filters::{FilterEngine, FilterError, FilterFn, FilterStage};
pub use renderer::{
    ErrorPolicy, RenderError, RenderErrorKind, RenderOptions, RenderOutput, Renderer,
};
pub use value::{Map, Value, ValueType};

use stencil_lexer::{Delimiters, LexerError};
use stencil_parser::Template;

/// Anything that can stop [`render_str`] from producing output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Render a parsed template with the built-in filters.
pub fn render(
    template: &Template,
    data: &Value,
    options: RenderOptions,
) -> Result<RenderOutput, RenderError> {
    Renderer::new(FilterEngine::new(), options).render(template, data)
}

/// Tokenize, parse and render `source` with default delimiters and options.
///
/// Parse diagnostics do not stop rendering; use
/// [`stencil_parser::parse_source`] directly to inspect them.
pub fn render_str(source: &str, data: &Value) -> Result<RenderOutput, Error> {
    let parsed = stencil_parser::parse_source(source, &Delimiters::default())?;
    if !parsed.errors.is_empty() {
        tracing::debug!(
            errors = parsed.errors.len(),
            "rendering a template with parse errors"
        );
    }
    Ok(render(&parsed.ast, data, RenderOptions::default())?)
}
