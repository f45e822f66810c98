//! Canonical serialization for reproducible state hashing.
//!
//! One logical value has exactly one canonical string, independent of
//! object-key insertion order. The hash cross-check with the producer is
//! defined over this string, so the rules here are a wire contract:
//! sorted object keys, holes kept as holes, non-finite numbers as null,
//! big integers as quoted decimal strings.

use crate::value::{Slot, Value};

/// Serialize a value into its canonical string form.
///
/// Pure and total: every value tree has a canonical form, including ones
/// JSON cannot represent. A bare `Undefined` at the root canonicalizes to
/// `null`.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Byte length of the canonical form, used for snapshot size ceilings.
#[must_use]
pub fn canonical_size(value: &Value) -> usize {
    canonicalize(value).len()
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Undefined | Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, *n),
        Value::BigInt(digits) => {
            out.push('"');
            out.push_str(digits);
            out.push('"');
        }
        Value::String(s) => write_escaped(out, s),
        Value::Array(slots) => {
            out.push('[');
            for (i, slot) in slots.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                match slot {
                    // A hole stays a hole: nothing between the commas.
                    Slot::Hole => {}
                    Slot::Item(v) => write_value(out, v),
                }
            }
            out.push(']');
        }
        Value::Object(entries) => {
            let mut pairs: Vec<(&String, &Value)> = entries
                .iter()
                .filter(|(_, v)| !v.is_undefined())
                .collect();
            // Exact code-unit ordering, the same order the producer sorts in.
            pairs.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, (key, child)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(out, key);
                out.push(':');
                write_value(out, child);
            }
            out.push('}');
        }
    }
}

/// Shortest round-trippable decimal form. Integer-valued doubles below
/// 1e21 print without a fraction; non-finite values are not representable
/// and collapse to null everywhere.
fn write_number(out: &mut String, n: f64) {
    if !n.is_finite() {
        out.push_str("null");
    } else if n == 0.0 {
        // covers -0 as well
        out.push('0');
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        out.push_str(&format!("{:.0}", n));
    } else {
        out.push_str(&format!("{}", n));
    }
}

fn write_escaped(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
