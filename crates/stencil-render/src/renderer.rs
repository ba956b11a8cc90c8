//! Tree-walking renderer.
//!
//! Walks a [`Template`] depth-first, appending text to one output buffer.
//! Problems met along the way are either collected (the default) or
//! returned immediately, depending on [`ErrorPolicy`].

use std::cmp::Ordering;

use stencil_lexer::Span;
use stencil_parser::ast::{
    BinaryOp, ExprKind, Expression, ForNode, IfNode, Literal, Node, NodeKind, PathSegment,
    Template, UnaryOp,
};

use crate::filters::{FilterEngine, FilterStage};
use crate::resolver;
use crate::value::{Map, Value};

/// Default limit on nested `if`/`for`/`block` bodies.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Largest array `range()` will build.
pub const MAX_RANGE_LEN: usize = 100_000;

/// Name of the per-iteration loop record.
pub const LOOP_VARIABLE: &str = "loop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record errors, keep rendering.
    #[default]
    Collect,
    /// Stop at the first error and return it.
    ThrowOnError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_depth: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn throw_on_error(self) -> Self {
        self.with_error_policy(ErrorPolicy::ThrowOnError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderErrorKind {
    FilterError,
    TypeError,
    RuntimeError,
}

impl std::fmt::Display for RenderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RenderErrorKind::FilterError => "filter_error",
            RenderErrorKind::TypeError => "type_error",
            RenderErrorKind::RuntimeError => "runtime_error",
        })
    }
}

/// A problem found while rendering.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Render error ({kind}): {message}")]
pub struct RenderError {
    pub kind: RenderErrorKind,
    pub message: String,
    /// Span of the node being rendered, when known.
    pub span: Option<Span>,
}

impl RenderError {
    pub fn new(kind: RenderErrorKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    fn filter(message: impl Into<String>, span: Span) -> Self {
        Self::new(RenderErrorKind::FilterError, message, Some(span))
    }

    fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(RenderErrorKind::TypeError, message, Some(span))
    }

    fn runtime(message: impl Into<String>, span: Span) -> Self {
        Self::new(RenderErrorKind::RuntimeError, message, Some(span))
    }
}

/// The result of a render: output is always present, even when errors were
/// collected.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub output: String,
    pub success: bool,
    pub errors: Vec<RenderError>,
}

/// Renders templates with a fixed filter set and options.
///
/// Holds no per-render state, so one renderer can be shared and reused.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    filters: FilterEngine,
    options: RenderOptions,
}

impl Renderer {
    pub fn new(filters: FilterEngine, options: RenderOptions) -> Self {
        Self { filters, options }
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `template` against `data`.
    ///
    /// Returns `Err` only under [`ErrorPolicy::ThrowOnError`].
    pub fn render(&self, template: &Template, data: &Value) -> Result<RenderOutput, RenderError> {
        tracing::debug!(
            nodes = template.children.len(),
            max_depth = self.options.max_depth,
            policy = ?self.options.error_policy,
            "render started"
        );

        let mut ctx = RenderContext::new(self, data);
        let mut output = String::new();
        ctx.render_nodes(&template.children, &mut output)?;

        let errors = ctx.errors;
        tracing::debug!(
            output_len = output.len(),
            errors = errors.len(),
            "render finished"
        );
        Ok(RenderOutput {
            output,
            success: errors.is_empty(),
            errors,
        })
    }
}

/// Per-render state: scope stack, nesting depth, collected errors.
struct RenderContext<'r> {
    renderer: &'r Renderer,
    data: &'r Value,
    /// Innermost scope last. The first scope holds top-level `set` bindings.
    scopes: Vec<Map>,
    depth: usize,
    errors: Vec<RenderError>,
}

impl<'r> RenderContext<'r> {
    fn new(renderer: &'r Renderer, data: &'r Value) -> Self {
        Self {
            renderer,
            data,
            scopes: vec![Map::new()],
            depth: 0,
            errors: Vec::new(),
        }
    }

    fn record(&mut self, error: RenderError) -> Result<(), RenderError> {
        match self.renderer.options.error_policy {
            ErrorPolicy::ThrowOnError => Err(error),
            ErrorPolicy::Collect => {
                self.errors.push(error);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), RenderError> {
        for node in nodes {
            self.render_node(node, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, out: &mut String) -> Result<(), RenderError> {
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Expression(expr) => {
                let value = self.eval_optional(expr)?;
                out.push_str(&resolver::to_string(value.as_ref()));
            }
            NodeKind::If(if_node) => self.render_if(if_node, node.span, out)?,
            NodeKind::For(for_node) => self.render_for(for_node, node.span, out)?,
            NodeKind::Set(set) => {
                let value = self.eval(&set.value)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(set.name.clone(), value);
                }
            }
            NodeKind::Block(block) => {
                if self.enter(node.span)? {
                    let result = self.render_nodes(&block.body, out);
                    self.depth -= 1;
                    result?;
                }
            }
            // Already reported by the parser.
            NodeKind::Error { .. } => {}
        }
        Ok(())
    }

    fn render_if(
        &mut self,
        if_node: &IfNode,
        span: Span,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let condition = self.eval_optional(&if_node.condition)?;
        let branch = if resolver::to_boolean(condition.as_ref()) {
            Some(if_node.body.as_slice())
        } else {
            if_node.else_body.as_deref()
        };
        let Some(branch) = branch else {
            return Ok(());
        };

        if self.enter(span)? {
            let result = self.render_nodes(branch, out);
            self.depth -= 1;
            result?;
        }
        Ok(())
    }

    fn render_for(
        &mut self,
        for_node: &ForNode,
        span: Span,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let items = match self.eval_optional(&for_node.iterable)? {
            Some(Value::Array(items)) => items,
            other => {
                return self.record(RenderError::type_error(
                    format!(
                        "Cannot iterate over {} in 'for {}' loop; expected an array",
                        resolver::get_type(other.as_ref()),
                        for_node.iterator
                    ),
                    span,
                ))
            }
        };

        if !self.enter(span)? {
            return Ok(());
        }
        let length = items.len();
        let mut result = Ok(());
        for (index, item) in items.into_iter().enumerate() {
            let mut scope = Map::new();
            scope.insert(for_node.iterator.clone(), item);
            scope.insert(LOOP_VARIABLE.into(), loop_record(index, length));

            self.scopes.push(scope);
            result = self.render_nodes(&for_node.body, out);
            self.scopes.pop();
            if result.is_err() {
                break;
            }
        }
        self.depth -= 1;
        result
    }

    /// Enter a nested body. Returns `false` when the depth limit is hit and
    /// the body must be skipped.
    fn enter(&mut self, span: Span) -> Result<bool, RenderError> {
        let max_depth = self.renderer.options.max_depth;
        if self.depth >= max_depth {
            tracing::warn!(max_depth, line = span.start.line, "maximum nesting depth exceeded");
            self.record(RenderError::runtime(
                format!("Maximum nesting depth of {max_depth} exceeded"),
                span,
            ))?;
            return Ok(false);
        }
        self.depth += 1;
        Ok(true)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Like [`eval`](Self::eval), but keeps an unresolved variable as
    /// `None` instead of folding it into `Null`.
    fn eval_optional(&mut self, expr: &Expression) -> Result<Option<Value>, RenderError> {
        match &expr.kind {
            ExprKind::Variable { name, path } => self.resolve_variable(name, path),
            _ => self.eval(expr).map(Some),
        }
    }

    /// Walks a variable path with the same step functions as
    /// [`resolver::resolve`]; bracket indexes are evaluated first.
    fn resolve_variable(
        &mut self,
        name: &str,
        path: &[PathSegment],
    ) -> Result<Option<Value>, RenderError> {
        let mut current = self.lookup(name);
        for segment in path {
            let Some(value) = current.take() else {
                break;
            };
            current = match segment {
                PathSegment::Property(key) => resolver::property(&value, key),
                PathSegment::Index(index) => {
                    let index = self.eval(index)?;
                    resolver::index(&value, &index)
                }
            };
        }
        Ok(current)
    }

    fn eval(&mut self, expr: &Expression) -> Result<Value, RenderError> {
        let value = match &expr.kind {
            ExprKind::Variable { name, path } => {
                self.resolve_variable(name, path)?.unwrap_or_default()
            }

            ExprKind::Literal(literal) => literal_value(literal),

            ExprKind::Filter { source, filters } => {
                let value = self.eval(source)?;
                let mut stages = Vec::with_capacity(filters.len());
                for filter in filters {
                    let args = self.eval_all(&filter.args)?;
                    stages.push(FilterStage::new(filter.name.clone(), args));
                }
                match self.renderer.filters.chain(value, &stages) {
                    Ok(value) => value,
                    Err(e) => {
                        self.record(RenderError::filter(e.to_string(), expr.span))?;
                        Value::Null
                    }
                }
            }

            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => left,
                    BinaryOp::Or if left.is_truthy() => left,
                    BinaryOp::And | BinaryOp::Or => self.eval(right)?,
                    _ => {
                        let right = self.eval(right)?;
                        binary(*op, &left, &right)
                    }
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Value::Bool(!operand.is_truthy()),
                    UnaryOp::Neg => Value::Number(-operand.to_number()),
                }
            }

            ExprKind::Ternary {
                condition,
                true_value,
                false_value,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(true_value)?
                } else {
                    self.eval(false_value)?
                }
            }

            ExprKind::Paren(inner) => self.eval(inner)?,

            ExprKind::Array(elements) => Value::Array(self.eval_all(elements)?),

            ExprKind::Object(properties) => {
                let mut map = Map::with_capacity(properties.len());
                for property in properties {
                    let value = self.eval(&property.value)?;
                    map.insert(property.key.clone(), value);
                }
                Value::Object(map)
            }

            ExprKind::FunctionCall { name, args, object } => {
                let receiver = match object {
                    Some(object) => Some(self.eval(object)?),
                    None => None,
                };
                let args = self.eval_all(args)?;
                self.call(name, receiver, args, expr.span)?
            }

            ExprKind::Error { .. } => Value::Null,
        };
        Ok(value)
    }

    fn eval_all(&mut self, exprs: &[Expression]) -> Result<Vec<Value>, RenderError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    /// Innermost binding first, then the data root.
    fn lookup(&self, name: &str) -> Option<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Some(value.clone());
            }
        }
        match self.data {
            Value::Object(map) => map.get(name).cloned(),
            _ => None,
        }
    }

    /// `range(...)` is built in. Every other call goes to the filter of the
    /// same name, with the receiver (or first argument) as the piped value.
    fn call(
        &mut self,
        name: &str,
        receiver: Option<Value>,
        mut args: Vec<Value>,
        span: Span,
    ) -> Result<Value, RenderError> {
        if receiver.is_none() && name == "range" {
            return self.range(&args, span);
        }
        if !self.renderer.filters.contains(name) {
            self.record(RenderError::runtime(format!("Unknown function '{name}'"), span))?;
            return Ok(Value::Null);
        }

        let value = match receiver {
            Some(value) => value,
            None if args.is_empty() => Value::Null,
            None => args.remove(0),
        };
        match self.renderer.filters.apply(name, &value, &args) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.record(RenderError::filter(e.to_string(), span))?;
                Ok(Value::Null)
            }
        }
    }

    /// `range(end)`, `range(start, end)` or `range(start, end, step)`.
    fn range(&mut self, args: &[Value], span: Span) -> Result<Value, RenderError> {
        let numbers: Vec<f64> = args.iter().map(Value::to_number).collect();
        let (start, end, step) = match numbers.as_slice() {
            [end] => (0.0, *end, 1.0),
            [start, end] => (*start, *end, 1.0),
            [start, end, step] => (*start, *end, *step),
            _ => {
                self.record(RenderError::runtime(
                    format!("range() takes 1 to 3 arguments, got {}", args.len()),
                    span,
                ))?;
                return Ok(Value::Null);
            }
        };
        if step == 0.0 || !(start.is_finite() && end.is_finite() && step.is_finite()) {
            self.record(RenderError::runtime(
                "range() needs finite arguments and a non-zero step",
                span,
            ))?;
            return Ok(Value::Null);
        }

        let count = ((end - start) / step).ceil().max(0.0);
        if count > MAX_RANGE_LEN as f64 {
            self.record(RenderError::runtime(
                format!("range() would produce more than {MAX_RANGE_LEN} items"),
                span,
            ))?;
            return Ok(Value::Null);
        }
        let count = count as usize;
        Ok(Value::Array(
            (0..count)
                .map(|i| Value::Number(start + i as f64 * step))
                .collect(),
        ))
    }
}

fn loop_record(index: usize, length: usize) -> Value {
    let mut record = Map::new();
    record.insert("index".into(), Value::from(index + 1));
    record.insert("index0".into(), Value::from(index));
    record.insert("first".into(), Value::Bool(index == 0));
    record.insert("last".into(), Value::Bool(index + 1 == length));
    record.insert("length".into(), Value::from(length));
    record.insert("revindex".into(), Value::from(length - index));
    Value::Object(record)
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => Value::Number(*n),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

// ===========================================================================
// Operators
// ===========================================================================

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Neq => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNeq => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Lte => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gte => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::And => {
            if left.is_truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Or => {
            if left.is_truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
    }
}

/// Numeric addition, or concatenation when either side is text or a container.
fn add(left: &Value, right: &Value) -> Value {
    let numeric = |v: &Value| matches!(v, Value::Null | Value::Bool(_) | Value::Number(_));
    if numeric(left) && numeric(right) {
        Value::Number(left.to_number() + right.to_number())
    } else {
        Value::String(format!("{left}{right}"))
    }
}

/// `==`: scalars compare after numeric coercion unless both are strings.
fn loose_eq(left: &Value, right: &Value) -> bool {
    let scalar = |v: &Value| matches!(v, Value::Bool(_) | Value::Number(_) | Value::String(_));
    match (left, right) {
        (Value::String(a), Value::String(b)) => a == b,
        _ if scalar(left) && scalar(right) => left.to_number() == right.to_number(),
        _ => left == right,
    }
}

/// Strings order lexicographically; everything else numerically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}
