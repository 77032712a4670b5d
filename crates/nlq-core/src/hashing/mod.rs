//! Canonicalización JSON y hashing content-addressed.
//!
//! El registry direcciona artifacts por el blake3 hex de su payload
//! canonicalizado: claves de objeto en orden lexicográfico, sin whitespace,
//! escapes de string deterministas. Contenido idéntico produce siempre el
//! mismo hash, independiente del orden de construcción del `Value`.

use serde_json::Value;

/// Hash canónico de un `Value`: canonicaliza y luego hashea.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Hashea un string y devuelve hex.
pub fn hash_str(input: &str) -> String {
    hash_bytes(input.as_bytes())
}

/// Hashea bytes crudos (uploads de datasets) y devuelve hex.
pub fn hash_bytes(input: &[u8]) -> String {
    blake3::hash(input).to_hex().to_string()
}

/// Forma canónica de un `Value` como texto JSON.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

// Escape mínimo e infalible: los obligatorios de JSON más \u para el resto
// de los controles. Sin dependencia del serializador para que la forma
// canónica no cambie con versiones de serde_json.
fn write_escaped(s: &str, out: &mut String) {
    use std::fmt::Write;

    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
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
    fn canonical_form_sorts_keys_and_drops_whitespace() {
        let v = json!({"b": 1, "a": {"z": null, "y": [true, "x"]}});
        assert_eq!(to_canonical_json(&v), r#"{"a":{"y":[true,"x"],"z":null},"b":1}"#);
    }

    #[test]
    fn control_characters_are_escaped() {
        let v = json!("line\nbreak\u{1}");
        assert_eq!(to_canonical_json(&v), "\"line\\nbreak\\u0001\"");
    }

    #[test]
    fn key_order_does_not_change_hash() {
        let a = json!({"b": 1, "a": [1, 2, {"z": null, "y": true}]});
        let b = json!({"a": [1, 2, {"y": true, "z": null}], "b": 1});
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn distinct_payloads_distinct_hashes() {
        assert_ne!(hash_value(&json!({"rows": 1})), hash_value(&json!({"rows": 2})));
    }
}
