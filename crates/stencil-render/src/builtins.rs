//! Built-in filters.
//!
//! Every filter passes input of an unsupported type through unchanged.
//! Only `int` and `float` fail, and only on strings that are not numbers.

use std::cmp::Ordering;

use serde::Serialize;

use crate::filters::FilterEngine;
use crate::resolver;
use crate::value::Value;

type FilterResult = Result<Value, String>;

const DEFAULT_TRUNCATE_LENGTH: f64 = 255.0;
const DEFAULT_TRUNCATE_SUFFIX: &str = "...";

pub(crate) fn register_all(engine: &mut FilterEngine) {
    // Strings
    engine.register("upper", upper);
    engine.register("lower", lower);
    engine.register("capitalize", capitalize);
    engine.register("title", title);
    engine.register("trim", trim);
    engine.register("split", split);
    engine.register("replace", replace);
    engine.register("truncate", truncate);

    // Sequences
    engine.register("length", length);
    engine.register("reverse", reverse);
    engine.register("first", first);
    engine.register("last", last);
    engine.register("slice", slice);
    engine.register("join", join);
    engine.register("filter", filter);
    engine.register("reject", reject);
    engine.register("map", map);
    engine.register("sort", sort);
    engine.register("unique", unique);
    engine.register("sum", sum);
    engine.register("keys", keys);
    engine.register("values", values);

    // Coercion
    engine.register("int", int);
    engine.register("float", float);
    engine.register("string", string);
    engine.register("default", default);
    engine.register("json", json);

    // Numbers
    engine.register("abs", abs);
    engine.register("round", round);
}

fn str_arg(args: &[Value], i: usize) -> Option<&str> {
    args.get(i).and_then(Value::as_str)
}

fn num_arg(args: &[Value], i: usize) -> Option<f64> {
    args.get(i).and_then(Value::as_f64)
}

fn map_str(value: &Value, f: impl FnOnce(&str) -> String) -> FilterResult {
    Ok(match value {
        Value::String(s) => Value::String(f(s)),
        other => other.clone(),
    })
}

fn map_array(value: &Value, f: impl FnOnce(&[Value]) -> Value) -> FilterResult {
    Ok(match value {
        Value::Array(items) => f(items),
        other => other.clone(),
    })
}

// ===========================================================================
// Strings
// ===========================================================================

fn upper(value: &Value, _args: &[Value]) -> FilterResult {
    map_str(value, str::to_uppercase)
}

fn lower(value: &Value, _args: &[Value]) -> FilterResult {
    map_str(value, str::to_lowercase)
}

fn capitalize(value: &Value, _args: &[Value]) -> FilterResult {
    map_str(value, |s| {
        let mut chars = s.chars();
        match chars.next() {
            Some(head) => head
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => String::new(),
        }
    })
}

fn title(value: &Value, _args: &[Value]) -> FilterResult {
    map_str(value, |s| {
        let mut out = String::with_capacity(s.len());
        let mut word_start = true;
        for c in s.chars() {
            if c.is_whitespace() {
                word_start = true;
                out.push(c);
            } else if word_start {
                word_start = false;
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
        }
        out
    })
}

fn trim(value: &Value, _args: &[Value]) -> FilterResult {
    map_str(value, |s| s.trim().to_string())
}

/// `split(sep = ",")`. An empty separator splits into characters.
fn split(value: &Value, args: &[Value]) -> FilterResult {
    let Value::String(s) = value else {
        return Ok(value.clone());
    };
    let sep = str_arg(args, 0).unwrap_or(",");
    let parts = if sep.is_empty() {
        s.chars().map(|c| Value::String(c.into())).collect()
    } else {
        s.split(sep).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

/// `replace(from, to = "")`, every occurrence.
fn replace(value: &Value, args: &[Value]) -> FilterResult {
    let Some(from) = str_arg(args, 0) else {
        return Ok(value.clone());
    };
    let to = args.get(1).map(Value::to_string).unwrap_or_default();
    map_str(value, |s| s.replace(from, &to))
}

/// `truncate(length = 255, suffix = "...")`. The suffix is appended only
/// when characters were cut.
fn truncate(value: &Value, args: &[Value]) -> FilterResult {
    let limit = num_arg(args, 0).unwrap_or(DEFAULT_TRUNCATE_LENGTH).max(0.0) as usize;
    let suffix = str_arg(args, 1).unwrap_or(DEFAULT_TRUNCATE_SUFFIX);
    map_str(value, |s| {
        if s.chars().count() <= limit {
            s.to_string()
        } else {
            let mut out: String = s.chars().take(limit).collect();
            out.push_str(suffix);
            out
        }
    })
}

// ===========================================================================
// Sequences
// ===========================================================================

fn length(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Array(items) => Value::from(items.len()),
        Value::Object(map) => Value::from(map.len()),
        Value::String(s) => Value::from(s.chars().count()),
        other => other.clone(),
    })
}

fn reverse(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
        Value::String(s) => Value::String(s.chars().rev().collect()),
        other => other.clone(),
    })
}

fn first(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Array(items) => items.first().cloned().unwrap_or_default(),
        Value::String(s) => Value::String(s.chars().take(1).collect()),
        other => other.clone(),
    })
}

fn last(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Array(items) => items.last().cloned().unwrap_or_default(),
        Value::String(s) => Value::String(s.chars().last().map(String::from).unwrap_or_default()),
        other => other.clone(),
    })
}

/// Resolve `slice` bounds: negative positions count from the end and
/// everything is clamped to `0..=len`.
fn slice_bounds(len: usize, start: f64, end: Option<f64>) -> (usize, usize) {
    let clamp = |n: f64| -> usize {
        let n = n.trunc();
        if n < 0.0 {
            (len as f64 + n).max(0.0) as usize
        } else {
            (n as usize).min(len)
        }
    };
    let start = clamp(start);
    let end = end.map_or(len, clamp);
    (start, end.max(start))
}

/// `slice(start = 0, end?)`
fn slice(value: &Value, args: &[Value]) -> FilterResult {
    let start = num_arg(args, 0).unwrap_or(0.0);
    let end = num_arg(args, 1);
    Ok(match value {
        Value::Array(items) => {
            let (start, end) = slice_bounds(items.len(), start, end);
            Value::Array(items[start..end].to_vec())
        }
        Value::String(s) => {
            let (start, end) = slice_bounds(s.chars().count(), start, end);
            Value::String(s.chars().skip(start).take(end - start).collect())
        }
        other => other.clone(),
    })
}

/// `join(sep = ",")`
fn join(value: &Value, args: &[Value]) -> FilterResult {
    let sep = str_arg(args, 0).unwrap_or(",");
    map_array(value, |items| {
        let parts: Vec<String> = items.iter().map(Value::to_string).collect();
        Value::String(parts.join(sep))
    })
}

/// Predicate for `filter`/`reject`: with a key, test that property of each
/// item; with an expected value, compare instead of testing truthiness.
fn item_matches(item: &Value, args: &[Value]) -> bool {
    let subject = match str_arg(args, 0) {
        Some(key) => resolver::property(item, key),
        None => Some(item.clone()),
    };
    match args.get(1) {
        Some(expected) => subject.as_ref() == Some(expected),
        None => resolver::to_boolean(subject.as_ref()),
    }
}

/// `filter(key?, expected?)`
fn filter(value: &Value, args: &[Value]) -> FilterResult {
    map_array(value, |items| {
        Value::Array(
            items
                .iter()
                .filter(|item| item_matches(item, args))
                .cloned()
                .collect(),
        )
    })
}

/// `reject(key?, expected?)`, the complement of `filter`.
fn reject(value: &Value, args: &[Value]) -> FilterResult {
    map_array(value, |items| {
        Value::Array(
            items
                .iter()
                .filter(|item| !item_matches(item, args))
                .cloned()
                .collect(),
        )
    })
}

/// `map(key)`: pluck one property from every item.
fn map(value: &Value, args: &[Value]) -> FilterResult {
    let Some(key) = str_arg(args, 0) else {
        return Ok(value.clone());
    };
    map_array(value, |items| {
        Value::Array(
            items
                .iter()
                .map(|item| resolver::property(item, key).unwrap_or_default())
                .collect(),
        )
    })
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// `sort(key?)`, stable. Mixed types order by type first.
fn sort(value: &Value, args: &[Value]) -> FilterResult {
    let key = str_arg(args, 0);
    map_array(value, |items| {
        let mut sorted = items.to_vec();
        match key {
            Some(key) => sorted.sort_by(|a, b| {
                let a = resolver::property(a, key).unwrap_or_default();
                let b = resolver::property(b, key).unwrap_or_default();
                compare_values(&a, &b)
            }),
            None => sorted.sort_by(compare_values),
        }
        Value::Array(sorted)
    })
}

/// Drop repeated items, keeping the first occurrence.
fn unique(value: &Value, _args: &[Value]) -> FilterResult {
    map_array(value, |items| {
        let mut seen: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !seen.contains(item) {
                seen.push(item.clone());
            }
        }
        Value::Array(seen)
    })
}

/// `sum(key?)`. Non-numeric items are skipped.
fn sum(value: &Value, args: &[Value]) -> FilterResult {
    let key = str_arg(args, 0);
    map_array(value, |items| {
        let total = items
            .iter()
            .filter_map(|item| match key {
                Some(key) => resolver::property(item, key).and_then(|v| v.as_f64()),
                None => item.as_f64(),
            })
            .sum::<f64>();
        Value::Number(total)
    })
}

fn keys(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Object(map) => Value::Array(map.keys().map(|k| Value::from(k.as_str())).collect()),
        other => other.clone(),
    })
}

fn values(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Object(map) => Value::Array(map.values().cloned().collect()),
        other => other.clone(),
    })
}

// ===========================================================================
// Coercion
// ===========================================================================

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn int(value: &Value, _args: &[Value]) -> FilterResult {
    match value {
        Value::Number(n) => Ok(Value::Number(n.trunc())),
        Value::Bool(b) => Ok(Value::from(f64::from(u8::from(*b)))),
        Value::String(s) => parse_number(s)
            .map(|n| Value::Number(n.trunc()))
            .ok_or_else(|| format!("cannot convert '{s}' to an integer")),
        other => Ok(other.clone()),
    }
}

fn float(value: &Value, _args: &[Value]) -> FilterResult {
    match value {
        Value::Bool(b) => Ok(Value::from(f64::from(u8::from(*b)))),
        Value::String(s) => parse_number(s)
            .map(Value::Number)
            .ok_or_else(|| format!("cannot convert '{s}' to a number")),
        other => Ok(other.clone()),
    }
}

fn string(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(Value::String(value.to_string()))
}

/// `default(fallback = "")`, used whenever the value is falsy.
fn default(value: &Value, args: &[Value]) -> FilterResult {
    if value.is_truthy() {
        Ok(value.clone())
    } else {
        Ok(args.first().cloned().unwrap_or_else(|| Value::from("")))
    }
}

/// `json(indent?)`: explicit serialization, compact unless an indent
/// width is given.
fn json(value: &Value, args: &[Value]) -> FilterResult {
    let indent = num_arg(args, 0).unwrap_or(0.0).max(0.0) as usize;
    if indent == 0 {
        return serde_json::to_string(value)
            .map(Value::String)
            .map_err(|e| e.to_string());
    }

    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buf)
        .map(Value::String)
        .map_err(|e| e.to_string())
}

// ===========================================================================
// Numbers
// ===========================================================================

fn abs(value: &Value, _args: &[Value]) -> FilterResult {
    Ok(match value {
        Value::Number(n) => Value::Number(n.abs()),
        other => other.clone(),
    })
}

/// `round(precision = 0)`, half away from zero.
fn round(value: &Value, args: &[Value]) -> FilterResult {
    let precision = num_arg(args, 0).unwrap_or(0.0).clamp(0.0, 15.0) as i32;
    Ok(match value {
        Value::Number(n) => {
            let factor = 10f64.powi(precision);
            Value::Number((n * factor).round() / factor)
        }
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn apply(name: &str, value: serde_json::Value, args: serde_json::Value) -> Value {
        let args: Vec<Value> = match Value::from(args) {
            Value::Array(items) => items,
            other => vec![other],
        };
        FilterEngine::new()
            .apply(name, &Value::from(value), &args)
            .unwrap()
    }

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    // =======================================================================
    // Strings
    // =======================================================================

    #[test]
    fn test_case_filters() {
        assert_eq!(apply("upper", json!("abc"), json!([])), v(json!("ABC")));
        assert_eq!(apply("lower", json!("ABC"), json!([])), v(json!("abc")));
        assert_eq!(apply("capitalize", json!("hELLO wORLD"), json!([])), v(json!("Hello world")));
        assert_eq!(apply("title", json!("hello  big\tworld"), json!([])), v(json!("Hello  Big\tWorld")));
        assert_eq!(apply("capitalize", json!(""), json!([])), v(json!("")));
    }

    #[test]
    fn test_wrong_type_passes_through() {
        assert_eq!(apply("upper", json!(42), json!([])), v(json!(42)));
        assert_eq!(apply("join", json!("abc"), json!([])), v(json!("abc")));
        assert_eq!(apply("abs", json!("x"), json!([])), v(json!("x")));
        assert_eq!(apply("keys", json!([1]), json!([])), v(json!([1])));
    }

    #[test]
    fn test_trim() {
        assert_eq!(apply("trim", json!("  hi \n"), json!([])), v(json!("hi")));
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(apply("split", json!("a,b,c"), json!([])), v(json!(["a", "b", "c"])));
        assert_eq!(apply("split", json!("a b"), json!([" "])), v(json!(["a", "b"])));
        assert_eq!(apply("split", json!("ab"), json!([""])), v(json!(["a", "b"])));
        assert_eq!(apply("join", json!(["a", 1, null]), json!([])), v(json!("a,1,")));
        assert_eq!(apply("join", json!(["a", "b"]), json!([" - "])), v(json!("a - b")));
    }

    #[test]
    fn test_replace() {
        assert_eq!(apply("replace", json!("a-b-c"), json!(["-", "+"])), v(json!("a+b+c")));
        assert_eq!(apply("replace", json!("a-b"), json!(["-"])), v(json!("ab")));
        assert_eq!(apply("replace", json!("a-b"), json!([])), v(json!("a-b")));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(apply("truncate", json!("hello world"), json!([5])), v(json!("hello...")));
        assert_eq!(apply("truncate", json!("hello"), json!([5])), v(json!("hello")));
        assert_eq!(apply("truncate", json!("héllo"), json!([2, "…"])), v(json!("hé…")));
    }

    // =======================================================================
    // Sequences
    // =======================================================================

    #[test]
    fn test_length() {
        assert_eq!(apply("length", json!([1, 2]), json!([])), v(json!(2)));
        assert_eq!(apply("length", json!("héllo"), json!([])), v(json!(5)));
        assert_eq!(apply("length", json!({"a": 1}), json!([])), v(json!(1)));
    }

    #[test]
    fn test_first_last_reverse() {
        assert_eq!(apply("first", json!([1, 2]), json!([])), v(json!(1)));
        assert_eq!(apply("last", json!([1, 2]), json!([])), v(json!(2)));
        assert_eq!(apply("first", json!([]), json!([])), Value::Null);
        assert_eq!(apply("last", json!("abc"), json!([])), v(json!("c")));
        assert_eq!(apply("reverse", json!([1, 2, 3]), json!([])), v(json!([3, 2, 1])));
        assert_eq!(apply("reverse", json!("abc"), json!([])), v(json!("cba")));
    }

    #[test]
    fn test_slice() {
        assert_eq!(apply("slice", json!([1, 2, 3, 4]), json!([1, 3])), v(json!([2, 3])));
        assert_eq!(apply("slice", json!([1, 2, 3, 4]), json!([-2])), v(json!([3, 4])));
        assert_eq!(apply("slice", json!([1, 2]), json!([5])), v(json!([])));
        assert_eq!(apply("slice", json!([1, 2, 3]), json!([2, 1])), v(json!([])));
        assert_eq!(apply("slice", json!("hello"), json!([1, -1])), v(json!("ell")));
    }

    #[test]
    fn test_filter_and_reject() {
        let users = json!([
            {"name": "a", "active": true, "role": "admin"},
            {"name": "b", "active": false, "role": "user"},
            {"name": "c", "active": true, "role": "user"}
        ]);
        assert_eq!(
            apply("map", apply_json("filter", users.clone(), json!(["active"])), json!(["name"])),
            v(json!(["a", "c"]))
        );
        assert_eq!(
            apply("map", apply_json("filter", users.clone(), json!(["role", "user"])), json!(["name"])),
            v(json!(["b", "c"]))
        );
        assert_eq!(
            apply("map", apply_json("reject", users, json!(["active"])), json!(["name"])),
            v(json!(["b"]))
        );
        assert_eq!(apply("filter", json!([0, 1, "", "x", null]), json!([])), v(json!([1, "x"])));
    }

    fn apply_json(name: &str, value: serde_json::Value, args: serde_json::Value) -> serde_json::Value {
        serde_json::to_value(apply(name, value, args)).unwrap()
    }

    #[test]
    fn test_map_missing_key_is_null() {
        assert_eq!(apply("map", json!([{"a": 1}, {}]), json!(["a"])), v(json!([1, null])));
    }

    #[test]
    fn test_sort() {
        assert_eq!(apply("sort", json!([3, 1, 2]), json!([])), v(json!([1, 2, 3])));
        assert_eq!(apply("sort", json!(["b", "a", 1, null]), json!([])), v(json!([null, 1, "a", "b"])));
        assert_eq!(
            apply("sort", json!([{"n": 2}, {"n": 1}]), json!(["n"])),
            v(json!([{"n": 1}, {"n": 2}]))
        );
    }

    #[test]
    fn test_unique_keeps_first() {
        assert_eq!(apply("unique", json!([1, 2, 1, "1", 2]), json!([])), v(json!([1, 2, "1"])));
    }

    #[test]
    fn test_sum() {
        assert_eq!(apply("sum", json!([1, 2.5, "x"]), json!([])), v(json!(3.5)));
        assert_eq!(apply("sum", json!([{"p": 2}, {"p": 3}]), json!(["p"])), v(json!(5)));
    }

    #[test]
    fn test_keys_and_values_keep_order() {
        assert_eq!(apply("keys", json!({"b": 1, "a": 2}), json!([])), v(json!(["b", "a"])));
        assert_eq!(apply("values", json!({"b": 1, "a": 2}), json!([])), v(json!([1, 2])));
    }

    // =======================================================================
    // Coercion
    // =======================================================================

    #[test]
    fn test_int_and_float() {
        assert_eq!(apply("int", json!("42.9"), json!([])), v(json!(42)));
        assert_eq!(apply("int", json!(-3.7), json!([])), v(json!(-3)));
        assert_eq!(apply("float", json!(" 2.5 "), json!([])), v(json!(2.5)));
        assert_eq!(apply("int", json!(true), json!([])), v(json!(1)));
        assert_eq!(apply("int", json!([1]), json!([])), v(json!([1])));
    }

    #[test]
    fn test_int_rejects_non_numeric_string() {
        let err = FilterEngine::new()
            .apply("int", &Value::from("abc"), &[])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Filter 'int' failed: cannot convert 'abc' to an integer"
        );
    }

    #[test]
    fn test_string() {
        assert_eq!(apply("string", json!(3), json!([])), v(json!("3")));
        assert_eq!(apply("string", json!(null), json!([])), v(json!("")));
    }

    #[test]
    fn test_default() {
        assert_eq!(apply("default", json!(null), json!(["x"])), v(json!("x")));
        assert_eq!(apply("default", json!(0), json!([5])), v(json!(5)));
        assert_eq!(apply("default", json!([]), json!(["none"])), v(json!("none")));
        assert_eq!(apply("default", json!("set"), json!(["x"])), v(json!("set")));
        assert_eq!(apply("default", json!(null), json!([])), v(json!("")));
    }

    #[test]
    fn test_json() {
        assert_eq!(
            apply("json", json!({"a": [1, "x"], "b": null}), json!([])),
            v(json!(r#"{"a":[1,"x"],"b":null}"#))
        );
        assert_eq!(
            apply("json", json!({"a": 1}), json!([2])),
            v(json!("{\n  \"a\": 1\n}"))
        );
    }

    // =======================================================================
    // Numbers
    // =======================================================================

    #[test]
    fn test_abs_and_round() {
        assert_eq!(apply("abs", json!(-2.5), json!([])), v(json!(2.5)));
        assert_eq!(apply("round", json!(2.5), json!([])), v(json!(3)));
        assert_eq!(apply("round", json!(3.14159), json!([2])), v(json!(3.14)));
    }

    #[test]
    fn test_builtin_count() {
        assert_eq!(FilterEngine::new().names().len(), 29);
    }
}
