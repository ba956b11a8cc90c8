//! Boundary to an external schema validator.
//!
//! The engine does not infer or check data shapes itself. Tooling that has
//! a validator can hand it to [`validate_paths`] to turn every data path a
//! template reads into `Validation` diagnostics. The renderer never calls
//! into this module.

use std::collections::BTreeMap;

use crate::ast::{ExprKind, Expression, Literal, Node, NodeKind, PathSegment, Template};
use crate::{ParseError, ParseErrorKind};
use stencil_lexer::Span;

/// A validator that knows the shape of the data a template will receive.
pub trait SchemaValidator {
    /// Check a dotted/bracket data path such as `user.orders[0].total`.
    fn validate_query_path(&self, path: &str) -> PathValidation;

    /// Known paths and their shapes.
    fn metadata(&self) -> BTreeMap<String, PathMetadata>;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathValidation {
    pub valid: bool,
    pub errors: Vec<PathIssue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathIssue {
    pub path: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathMetadata {
    pub value_type: String,
    pub properties: Option<Vec<String>>,
    pub item_type: Option<String>,
}

/// A data path read by the template, with the span of the directive reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRef {
    pub path: String,
    pub span: Span,
}

/// Collect every variable path that reads from the data root, in source order.
///
/// Names bound by an enclosing `for` (including `loop`) or by an earlier
/// `set` are template-local and skipped. A dynamic index (`row[key]`) ends
/// the static part of the path.
pub fn variable_paths(template: &Template) -> Vec<VariableRef> {
    let mut collector = PathCollector {
        bound: Vec::new(),
        refs: Vec::new(),
    };
    collector.nodes(&template.children);
    collector.refs
}

/// Validate every data path against `validator`, returning one diagnostic per issue.
pub fn validate_paths(template: &Template, validator: &dyn SchemaValidator) -> Vec<ParseError> {
    let mut errors = Vec::new();
    for reference in variable_paths(template) {
        let result = validator.validate_query_path(&reference.path);
        if result.valid {
            continue;
        }
        for issue in result.errors {
            let mut error = ParseError::new(
                ParseErrorKind::Validation,
                format!("{}: {}", issue.path, issue.message),
                reference.span,
            );
            error.suggestion = issue.suggestion;
            errors.push(error);
        }
    }
    errors
}

struct PathCollector {
    bound: Vec<String>,
    refs: Vec<VariableRef>,
}

impl PathCollector {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Text(_) | NodeKind::Error { .. } => {}
            NodeKind::Expression(expr) => self.expr(expr),
            NodeKind::If(if_node) => {
                self.expr(&if_node.condition);
                self.nodes(&if_node.body);
                if let Some(else_body) = &if_node.else_body {
                    self.nodes(else_body);
                }
            }
            NodeKind::For(for_node) => {
                self.expr(&for_node.iterable);
                let mark = self.bound.len();
                self.bound.push(for_node.iterator.clone());
                self.bound.push("loop".into());
                self.nodes(&for_node.body);
                self.bound.truncate(mark);
            }
            NodeKind::Set(set) => {
                self.expr(&set.value);
                self.bound.push(set.name.clone());
            }
            NodeKind::Block(block) => self.nodes(&block.body),
        }
    }

    fn expr(&mut self, expr: &Expression) {
        match &expr.kind {
            ExprKind::Variable { name, path } => {
                for segment in path {
                    if let PathSegment::Index(index) = segment {
                        self.expr(index);
                    }
                }
                if !self.bound.iter().any(|b| b == name) {
                    self.refs.push(VariableRef {
                        path: static_path(name, path),
                        span: expr.span,
                    });
                }
            }
            ExprKind::Literal(_) | ExprKind::Error { .. } => {}
            ExprKind::Filter { source, filters } => {
                self.expr(source);
                for filter in filters {
                    filter.args.iter().for_each(|arg| self.expr(arg));
                }
            }
            ExprKind::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Ternary {
                condition,
                true_value,
                false_value,
            } => {
                self.expr(condition);
                self.expr(true_value);
                self.expr(false_value);
            }
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::Array(elements) => elements.iter().for_each(|e| self.expr(e)),
            ExprKind::Object(properties) => properties.iter().for_each(|p| self.expr(&p.value)),
            ExprKind::FunctionCall { args, object, .. } => {
                if let Some(object) = object {
                    self.expr(object);
                }
                args.iter().for_each(|arg| self.expr(arg));
            }
        }
    }
}

/// Render the statically known prefix of a variable path.
fn static_path(name: &str, path: &[PathSegment]) -> String {
    let mut out = name.to_string();
    for segment in path {
        match segment {
            PathSegment::Property(prop) => {
                out.push('.');
                out.push_str(prop);
            }
            PathSegment::Index(index) => match &index.kind {
                ExprKind::Literal(Literal::Number(n)) => out.push_str(&format!("[{n}]")),
                ExprKind::Literal(Literal::String(s)) => out.push_str(&format!("[\"{s}\"]")),
                _ => break,
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;
    use pretty_assertions::assert_eq;
    use stencil_lexer::Delimiters;

    fn template(source: &str) -> Template {
        parse_source(source, &Delimiters::default()).unwrap().ast
    }

    fn paths(source: &str) -> Vec<String> {
        variable_paths(&template(source))
            .into_iter()
            .map(|r| r.path)
            .collect()
    }

    /// Accepts only paths listed in its metadata.
    struct KnownPaths(BTreeMap<String, PathMetadata>);

    impl KnownPaths {
        fn new(paths: &[&str]) -> Self {
            let metadata = paths
                .iter()
                .map(|p| {
                    (
                        p.to_string(),
                        PathMetadata {
                            value_type: "string".into(),
                            properties: None,
                            item_type: None,
                        },
                    )
                })
                .collect();
            Self(metadata)
        }
    }

    impl SchemaValidator for KnownPaths {
        fn validate_query_path(&self, path: &str) -> PathValidation {
            if self.0.contains_key(path) {
                return PathValidation {
                    valid: true,
                    errors: Vec::new(),
                };
            }
            let suggestion = self
                .0
                .keys()
                .find(|known| known.eq_ignore_ascii_case(path))
                .map(|known| format!("Did you mean '{known}'?"));
            PathValidation {
                valid: false,
                errors: vec![PathIssue {
                    path: path.to_string(),
                    message: "unknown path".into(),
                    suggestion,
                }],
            }
        }

        fn metadata(&self) -> BTreeMap<String, PathMetadata> {
            self.0.clone()
        }
    }

    #[test]
    fn test_collects_data_paths() {
        assert_eq!(
            paths("{{ user.name }} {{ items[0].title | upper }}"),
            vec!["user.name", "items[0].title"]
        );
    }

    #[test]
    fn test_skips_loop_and_set_bindings() {
        assert_eq!(
            paths(
                "{% set n = count %}{% for x in xs %}{{ x.a }}{{ loop.index }}{{ n }}{% endfor %}{{ x }}"
            ),
            vec!["count", "xs", "x"]
        );
    }

    #[test]
    fn test_dynamic_index_truncates() {
        assert_eq!(paths("{{ row[key].value }}"), vec!["key", "row"]);
    }

    #[test]
    fn test_validate_paths_reports_unknown() {
        let validator = KnownPaths::new(&["user.name"]);
        let errors = validate_paths(&template("{{ user.name }}{{ User.Name }}"), &validator);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::Validation);
        assert_eq!(errors[0].suggestion.as_deref(), Some("Did you mean 'user.name'?"));
        assert_eq!(validator.metadata().len(), 1);
    }
}
