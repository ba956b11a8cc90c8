//! Variable resolution and value coercions.
//!
//! A missing value is `None` ("undefined") at this boundary; it never
//! raises. [`resolve`] is the textual form for host code; the renderer walks
//! parsed paths with the same [`property`] and [`index`] steps, and prints
//! and tests values through [`to_string`] and [`to_boolean`].

use crate::value::{Value, ValueType};

/// One step of a textual data path.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
    /// A bracket group that is neither an integer nor a quoted string.
    Unresolved(String),
}

/// Resolve a textual path such as `user.orders[0]["total"]` against `data`.
///
/// Consecutive dots collapse. Any missing intermediate value short-circuits
/// to `None`. Each step goes through [`property`] or [`index`], the same
/// functions the renderer walks variable paths with.
pub fn resolve(data: &Value, path: &str) -> Option<Value> {
    let mut current = data.clone();
    for step in parse_path(path) {
        current = match step {
            Step::Key(key) => property(&current, &key)?,
            Step::Index(i) => index(&current, &Value::from(i))?,
            Step::Unresolved(_) => return None,
        };
    }
    Some(current)
}

fn parse_path(path: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => push_key(&mut steps, &mut key),
            '[' => {
                push_key(&mut steps, &mut key);
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    steps.push(Step::Unresolved(inner));
                    return steps;
                }
                steps.push(bracket_step(inner.trim()));
            }
            _ => key.push(c),
        }
    }
    push_key(&mut steps, &mut key);
    steps
}

fn push_key(steps: &mut Vec<Step>, key: &mut String) {
    let trimmed = key.trim();
    if !trimmed.is_empty() {
        steps.push(Step::Key(trimmed.to_string()));
    }
    key.clear();
}

fn bracket_step(inner: &str) -> Step {
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(index) = inner.parse() {
            return Step::Index(index);
        }
    }
    for quote in ['"', '\''] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return Step::Key(inner[1..inner.len() - 1].to_string());
        }
    }
    Step::Unresolved(inner.to_string())
}

/// Stored property lookup, without computed properties.
fn lookup_property<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// `value.key`. Objects look up the key; arrays and strings expose
/// `length`, and arrays also accept a numeric key.
pub fn property(value: &Value, key: &str) -> Option<Value> {
    match lookup_property(value, key) {
        Some(found) => Some(found.clone()),
        None => computed_property(value, key),
    }
}

fn computed_property(value: &Value, key: &str) -> Option<Value> {
    match (value, key) {
        (Value::Array(items), "length") => Some(Value::from(items.len())),
        (Value::String(s), "length") => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

/// `value[index]` with an already evaluated index: array element for a
/// non-negative integer, key lookup for a string.
pub fn index(value: &Value, index: &Value) -> Option<Value> {
    match index {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => match value {
            Value::Array(items) => items.get(*n as usize).cloned(),
            Value::Object(map) => map.get(&crate::value::format_number(*n)).cloned(),
            Value::String(s) => s.chars().nth(*n as usize).map(|c| Value::String(c.into())),
            _ => None,
        },
        Value::String(key) => property(value, key),
        _ => None,
    }
}

/// Classify a possibly missing value.
pub fn get_type(value: Option<&Value>) -> ValueType {
    value.map_or(ValueType::Undefined, Value::value_type)
}

/// Only arrays and objects are iterable.
pub fn is_iterable(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Array(_) | Value::Object(_)))
}

/// Template truthiness. Undefined is false.
pub fn to_boolean(value: Option<&Value>) -> bool {
    value.is_some_and(Value::is_truthy)
}

/// Template stringification. Undefined prints as the empty string.
pub fn to_string(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}
