//! Canonical JSON for stable content hashing.
//!
//! Two values that differ only in object key order, in `null` members versus
//! missing members, or in `1` versus `1.0` produce the same canonical text.
//! Array order is significant and always preserved.

use serde_json::{Number, Value};
use std::fmt::Write;

/// Current canonicalization version. Changes when rules are modified.
pub const CANONICALIZATION_VERSION: &str = "1.0.0";

/// Canonicalizer for normalizing JSON values before hashing.
#[derive(Debug, Clone, Copy)]
pub struct Canonicalizer {
    /// Drop object members whose value is `null`.
    drop_nulls: bool,
    /// Drop object members whose value is an empty array or object.
    drop_empty: bool,
}

impl Canonicalizer {
    /// Create the default canonicalizer.
    ///
    /// Absent, `null` and empty-container members are all treated as the same
    /// value, matching how the report model reads optional fields.
    pub fn new() -> Self {
        Self {
            drop_nulls: true,
            drop_empty: true,
        }
    }

    /// Create a canonicalizer that only sorts keys and keeps every member.
    pub fn strict() -> Self {
        Self {
            drop_nulls: false,
            drop_empty: false,
        }
    }

    /// Canonicalize a value to compact JSON text with sorted keys.
    pub fn canonicalize(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_value(value, &mut out);
        out
    }

    fn write_value(&self, value: &Value, out: &mut String) {
        match value {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => write_number(n, out),
            Value::String(s) => write_string(s, out),
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_value(item, out);
                }
                out.push(']');
            }
            Value::Object(map) => {
                let mut keys: Vec<&String> = map
                    .iter()
                    .filter(|(_, v)| !self.is_dropped(v))
                    .map(|(k, _)| k)
                    .collect();
                keys.sort();

                out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_string(key, out);
                    out.push(':');
                    self.write_value(&map[key], out);
                }
                out.push('}');
            }
        }
    }

    fn is_dropped(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.drop_nulls,
            Value::Array(items) => self.drop_empty && items.is_empty(),
            Value::Object(map) => self.drop_empty && map.iter().all(|(_, v)| self.is_dropped(v)),
            _ => false,
        }
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_number(n: &Number, out: &mut String) {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            // Integral floats print like integers so 1 and 1.0 hash equally.
            if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
                let _ = write!(out, "{}", f as i64);
                return;
            }
        }
    }
    let _ = write!(out, "{}", n);
}

fn write_string(s: &str, out: &mut String) {
    // serde_json escaping of a plain string cannot fail
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}
