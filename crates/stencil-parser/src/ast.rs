//! Abstract Syntax Tree for stencil templates.
//!
//! Statement-level nodes ([`Node`]) form the document structure; each
//! directive body holds an expression tree ([`Expression`]). Every node
//! carries the source span of the token(s) it was built from. The tree is
//! built once per parse and only read afterwards.

pub use stencil_lexer::Span;

// ---------------------------------------------------------------------------
// Statement-level AST
// ---------------------------------------------------------------------------

/// A parsed template: the root of the tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub children: Vec<Node>,
    pub span: Span,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Literal text, emitted verbatim.
    Text(String),

    /// `{{ expr }}`
    Expression(Expression),

    /// `{% if %} ... {% elif %} ... {% else %} ... {% endif %}`
    If(IfNode),

    /// `{% for x in xs %} ... {% endfor %}`
    For(ForNode),

    /// `{% set name = expr %}`
    Set(SetNode),

    /// `{% block name %} ... {% endblock %}`
    Block(BlockNode),

    /// Placeholder left where a statement could not be parsed. Never has children.
    Error { message: String, recovered: bool },
}

/// Conditional. An `elif` chain is a nested `If` as the sole `else_body` node.
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub condition: Expression,
    pub body: Vec<Node>,
    pub else_body: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub iterator: String,
    pub iterable: Expression,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetNode {
    pub name: String,
    pub value: Expression,
}

/// Named grouping. Renders inline, no scope of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub name: String,
    pub body: Vec<Node>,
}

// ---------------------------------------------------------------------------
// Expression-level AST
// ---------------------------------------------------------------------------

/// A complete expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expression {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `user`, `user.name`, `items[0]`, `row[key]`
    Variable { name: String, path: Vec<PathSegment> },

    /// `"text"`, `42`, `true`, `null`
    Literal(Literal),

    /// `value | upper | truncate(10)`
    Filter {
        source: Box<Expression>,
        filters: Vec<FilterCall>,
    },

    /// `a + b`, `count > 0`
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `!done`, `-offset`
    Unary { op: UnaryOp, operand: Box<Expression> },

    /// `cond ? a : b`
    Ternary {
        condition: Box<Expression>,
        true_value: Box<Expression>,
        false_value: Box<Expression>,
    },

    /// `(expr)`
    Paren(Box<Expression>),

    /// `[1, 2, 3]`
    Array(Vec<Expression>),

    /// `{ key: value }`
    Object(Vec<ObjectProperty>),

    /// `range(3)`, or `name.upper()` with `object` holding the receiver.
    FunctionCall {
        name: String,
        args: Vec<Expression>,
        object: Option<Box<Expression>>,
    },

    /// Placeholder for an expression that could not be parsed.
    Error { message: String },
}

/// One accessor in a variable path, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// `.name`
    Property(String),
    /// `[expr]`
    Index(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl Literal {
    pub fn value_type(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Number(_) => "number",
            Literal::Boolean(_) => "boolean",
            Literal::Null => "null",
        }
    }
}

/// One stage of a filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub key: String,
    pub value: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
}

impl BinaryOp {
    /// Every operator, longest symbols first so prefixes never shadow them.
    pub const ALL: [BinaryOp; 15] = [
        BinaryOp::StrictEq,
        BinaryOp::StrictNeq,
        BinaryOp::Eq,
        BinaryOp::Neq,
        BinaryOp::Lte,
        BinaryOp::Gte,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNeq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Lte => "<=",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::StrictEq | BinaryOp::StrictNeq => 3,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}
