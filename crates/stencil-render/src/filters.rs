//! Filter registry.
//!
//! A [`FilterEngine`] owns the filters a [`Renderer`](crate::Renderer) can
//! call. It starts with the built-ins from [`crate::builtins`]; hosts add or
//! shadow entries with [`FilterEngine::register`] before handing the engine
//! to a renderer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A filter: receives the piped value plus its call arguments.
///
/// Returning `Err` is reserved for genuine failures. Input of the wrong
/// type should be passed through unchanged.
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync>;

/// A filter failure, normalized to one message shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Filter '{name}' failed: {cause}")]
pub struct FilterError {
    pub name: String,
    pub cause: String,
}

/// One stage of a filter chain with its evaluated arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub name: String,
    pub args: Vec<Value>,
}

impl FilterStage {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

#[derive(Clone)]
pub struct FilterEngine {
    filters: HashMap<String, FilterFn>,
}

impl FilterEngine {
    /// An engine with every built-in filter registered.
    pub fn new() -> Self {
        let mut engine = Self::empty();
        crate::builtins::register_all(&mut engine);
        engine
    }

    /// An engine with no filters at all.
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Add a filter, replacing any existing filter of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::trace!(filter = %name, "registering filter");
        self.filters.insert(name, Arc::new(filter));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Apply one filter by name.
    pub fn apply(&self, name: &str, value: &Value, args: &[Value]) -> Result<Value, FilterError> {
        let filter = self.filters.get(name).ok_or_else(|| FilterError {
            name: name.to_string(),
            cause: "unknown filter".into(),
        })?;
        tracing::trace!(filter = name, args = args.len(), "applying filter");
        filter(value, args).map_err(|cause| FilterError {
            name: name.to_string(),
            cause,
        })
    }

    /// Fold `stages` left to right, each output feeding the next stage.
    /// Stops at the first failure.
    pub fn chain(&self, value: Value, stages: &[FilterStage]) -> Result<Value, FilterError> {
        stages
            .iter()
            .try_fold(value, |acc, stage| self.apply(&stage.name, &acc, &stage.args))
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEngine")
            .field("filters", &self.names())
            .finish()
    }
}
