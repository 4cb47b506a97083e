//! JSON Canonicalization Scheme (RFC 8785) over `serde_json::Value`.
//!
//! [`canonicalize`] is the single choke point every content hash, report
//! hash, and JWS payload in this workspace passes through. Byte-exactness
//! here is load-bearing: two implementations that canonicalize the same
//! logical value must produce the same bytes, or cross-implementation
//! parity testing (spec §8) is meaningless.

use serde_json::{Map, Number, Value};

use crate::error::{CanonError, CanonResult};

/// Sentinel string used internally to mark a field as "absent" (as opposed
/// to `null`) while hand-assembling a claims or manifest [`Value`].
///
/// Never produced by ordinary JSON input — NUL bytes cannot appear in a
/// JSON string literal from a conforming parser — so a collision with
/// real data is not a practical concern.
const ABSENT_SENTINEL: &str = "\u{0}peac:absent\u{0}";

/// The distinguished "absent" marker. Insert this instead of `Value::Null`
/// when a field was not supplied, then run [`strip_absent`] before
/// canonicalizing. `Value::Null` itself always survives stripping.
#[must_use]
pub fn absent() -> Value {
    Value::String(ABSENT_SENTINEL.to_string())
}

fn is_absent(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == ABSENT_SENTINEL)
}

/// Recursively remove every object property whose value is [`absent`].
/// `null` literals are left untouched — JCS distinguishes the two.
pub fn strip_absent(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !is_absent(v));
            for v in map.values_mut() {
                strip_absent(v);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                strip_absent(v);
            }
        }
        _ => {}
    }
}

/// Produce canonical UTF-8 bytes for `value` per RFC 8785.
///
/// Callers are responsible for running [`strip_absent`] first if the
/// value was hand-assembled with [`absent`] markers; values produced by
/// `serde_json::to_value` of a struct using `#[serde(skip_serializing_if
/// = "Option::is_none")]` never contain the marker and can be passed
/// straight through.
///
/// # Errors
/// Returns [`CanonError::InvalidValue`] for non-finite numbers, for
/// object keys that fail to round-trip as strings, or for numbers that
/// cannot be represented as an `f64`.
pub fn canonicalize(value: &Value) -> CanonResult<Vec<u8>> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

/// Convenience wrapper returning the canonical bytes as a `String`.
///
/// # Errors
/// Same as [`canonicalize`].
pub fn canonicalize_to_string(value: &Value) -> CanonResult<String> {
    canonicalize(value).map(|bytes| {
        String::from_utf8(bytes).expect("canonicalize always emits valid UTF-8")
    })
}

fn write_value(value: &Value, out: &mut String) -> CanonResult<()> {
    match value {
        Value::Null => {
            out.push_str("null");
            Ok(())
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Number(n) => write_number(n, out),
        Value::String(s) => {
            write_escaped_string(s, out);
            Ok(())
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::Object(map) => write_object(map, out),
    }
}

fn write_object(map: &Map<String, Value>, out: &mut String) -> CanonResult<()> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| utf16_cmp(a, b));

    out.push('{');
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_escaped_string(key, out);
        out.push(':');
        write_value(&map[*key], out)?;
    }
    out.push('}');
    Ok(())
}

/// Compare two strings by UTF-16 code unit sequence, as RFC 8785 mandates
/// (the `String.prototype.localeCompare`-free `<` ordering JavaScript
/// engines use for `Array.prototype.sort()` on strings).
fn utf16_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

/// RFC 8785 §3.2.2.3: numbers are serialized as their shortest decimal
/// representation that round-trips losslessly through an IEEE-754 double.
/// `serde_json`'s default float formatter (via `ryu`) already produces
/// that shortest round-trip form; integers are emitted without a
/// fractional part or exponent.
fn write_number(n: &Number, out: &mut String) -> CanonResult<()> {
    use std::fmt::Write as _;

    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
        return Ok(());
    }
    let f = n
        .as_f64()
        .ok_or_else(|| CanonError::invalid(format!("number {n} has no f64 representation")))?;
    if !f.is_finite() {
        return Err(CanonError::invalid("non-finite numbers are not canonicalizable"));
    }
    if f == f.trunc() && f.abs() < 1e15 {
        // Integral value that serde_json chose to store as a float
        // (e.g. parsed from "3.0"): JCS wants it written without a
        // fractional part. Rust's `{}` formatter for f64 already
        // produces the shortest round-tripping decimal representation.
        let _ = write!(out, "{}", f as i64);
    } else {
        let _ = write!(out, "{f}");
    }
    Ok(())
}

/// RFC 8785 §3.2.2.2 string escaping: the minimal set required by JSON
/// (`"`, `\`, and control characters `< 0x20`), using `\uXXXX` for the
/// remaining control characters and leaving everything else — including
/// non-ASCII — as literal UTF-8.
fn write_escaped_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let v = json!({"outer": {"z": 1, "a": 2}, "inner": {"b": 3}});
        assert_eq!(
            canonicalize_to_string(&v).unwrap(),
            r#"{"inner":{"b":3},"outer":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn arrays_preserve_order() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonicalize_to_string(&v).unwrap(), "[3,1,2]");
    }

    #[test]
    fn integers_have_no_fractional_part() {
        let v = json!({"n": 3.0});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"n":3}"#);
    }

    #[test]
    fn floats_use_shortest_round_trip_form() {
        let v = json!({"n": 0.1});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"n":0.1}"#);
    }

    #[test]
    fn strips_absent_but_preserves_null() {
        let mut v = json!({"a": 1, "b": null});
        if let Value::Object(map) = &mut v {
            map.insert("c".to_string(), absent());
        }
        strip_absent(&mut v);
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"a":1,"b":null}"#);
    }

    #[test]
    fn strips_absent_in_nested_objects() {
        let mut v = json!({"outer": {"a": 1}});
        if let Value::Object(outer) = v.get_mut("outer").unwrap() {
            outer.insert("b".to_string(), absent());
        }
        strip_absent(&mut v);
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"outer":{"a":1}}"#);
    }

    #[test]
    fn string_escaping_matches_rfc8785() {
        let v = json!("line\nbreak\ttab\"quote\\back");
        assert_eq!(
            canonicalize_to_string(&v).unwrap(),
            r#""line\nbreak\ttab\"quote\\back""#
        );
    }

    #[test]
    fn control_character_uses_u_escape() {
        let v = Value::String("\u{1}".to_string());
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#""""#);
    }

    #[test]
    fn non_ascii_left_as_literal_utf8() {
        let v = json!("caf\u{e9}");
        assert_eq!(canonicalize_to_string(&v).unwrap(), "\"caf\u{e9}\"");
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = json!({"a": [1, 2], "b": {"c": 3}});
        let s = canonicalize_to_string(&v).unwrap();
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn determinism_across_permuted_insertion_order() {
        let mut m1 = Map::new();
        m1.insert("a".to_string(), json!(1));
        m1.insert("b".to_string(), json!(2));
        let mut m2 = Map::new();
        m2.insert("b".to_string(), json!(2));
        m2.insert("a".to_string(), json!(1));
        assert_eq!(
            canonicalize(&Value::Object(m1)).unwrap(),
            canonicalize(&Value::Object(m2)).unwrap()
        );
    }

    proptest::proptest! {
        #[test]
        fn canonicalization_is_deterministic(a in 0i64..1_000_000, b in 0i64..1_000_000, s in "[a-z]{1,8}") {
            let v = json!({"a": a, "b": b, "s": s});
            let once = canonicalize(&v).unwrap();
            let twice = canonicalize(&v).unwrap();
            proptest::prop_assert_eq!(once, twice);
        }

        #[test]
        fn key_order_does_not_affect_output(a in 0i64..1_000_000, b in 0i64..1_000_000) {
            let mut m1 = Map::new();
            m1.insert("alpha".to_string(), json!(a));
            m1.insert("beta".to_string(), json!(b));
            let mut m2 = Map::new();
            m2.insert("beta".to_string(), json!(b));
            m2.insert("alpha".to_string(), json!(a));
            proptest::prop_assert_eq!(
                canonicalize(&Value::Object(m1)).unwrap(),
                canonicalize(&Value::Object(m2)).unwrap()
            );
        }
    }
}
