//! # Canonical DAG-CBOR Encoding
//!
//! Deterministic binary encoding of JSON-model values, the input to CID
//! hashing. Identical logical content always yields identical bytes,
//! whatever the insertion order of map keys.
//!
//! ## Byte Layout
//!
//! | Value | Encoding |
//! |-------|----------|
//! | null | `0xf6` |
//! | false / true | `0xf4` / `0xf5` |
//! | unsigned integer | major type 0, shortest argument |
//! | negative integer `n` | major type 1, argument `-1 - n` |
//! | non-integral number | `0xfb` + IEEE-754 binary64, big-endian |
//! | string | major type 3, byte length, UTF-8 |
//! | array | major type 4, item count, items |
//! | map | major type 5, entry count, entries sorted by key length then bytes |
//!
//! Floats are never narrowed to 16 or 32 bits, and NaN / infinities are
//! rejected rather than coerced.

use crate::primitives::MAX_ENCODING_DEPTH;
use crate::NbhdError;
use serde_json::{Number, Value};

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;
const FLOAT64: u8 = 0xfb;

/// Encode a value as canonical DAG-CBOR.
///
/// # Errors
///
/// Returns `NbhdError::Encoding` if the value contains a non-finite float
/// or nests deeper than `MAX_ENCODING_DEPTH`.
pub fn encode(value: &Value) -> Result<Vec<u8>, NbhdError> {
    let mut out = Vec::with_capacity(128);
    encode_value(value, 0, &mut out)?;
    Ok(out)
}

fn encode_value(value: &Value, depth: usize, out: &mut Vec<u8>) -> Result<(), NbhdError> {
    if depth > MAX_ENCODING_DEPTH {
        return Err(NbhdError::Encoding(format!(
            "value nests deeper than {} levels",
            MAX_ENCODING_DEPTH
        )));
    }

    match value {
        Value::Null => out.push(NULL),
        Value::Bool(false) => out.push(FALSE),
        Value::Bool(true) => out.push(TRUE),
        Value::Number(n) => encode_number(n, out)?,
        Value::String(s) => encode_text(s, out),
        Value::Array(items) => {
            write_head(MAJOR_ARRAY, items.len() as u64, out);
            for item in items {
                encode_value(item, depth + 1, out)?;
            }
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| {
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.as_bytes().cmp(b.as_bytes()))
            });

            write_head(MAJOR_MAP, entries.len() as u64, out);
            for (key, item) in entries {
                encode_text(key, out);
                encode_value(item, depth + 1, out)?;
            }
        }
    }

    Ok(())
}

fn encode_number(n: &Number, out: &mut Vec<u8>) -> Result<(), NbhdError> {
    if let Some(u) = n.as_u64() {
        write_head(MAJOR_UNSIGNED, u, out);
    } else if let Some(i) = n.as_i64() {
        // i is negative here; -1 - i cannot overflow for i >= i64::MIN
        write_head(MAJOR_NEGATIVE, (-1 - i) as u64, out);
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| NbhdError::Encoding(format!("unrepresentable number: {n}")))?;
        if !f.is_finite() {
            return Err(NbhdError::Encoding(format!(
                "non-finite float cannot be encoded: {f}"
            )));
        }
        out.push(FLOAT64);
        out.extend_from_slice(&f.to_bits().to_be_bytes());
    }
    Ok(())
}

fn encode_text(s: &str, out: &mut Vec<u8>) {
    write_head(MAJOR_TEXT, s.len() as u64, out);
    out.extend_from_slice(s.as_bytes());
}

/// Write a major type and its argument in the shortest form.
fn write_head(major: u8, arg: u64, out: &mut Vec<u8>) {
    let major = major << 5;
    if arg < 24 {
        out.push(major | arg as u8);
    } else if arg <= u64::from(u8::MAX) {
        out.push(major | 24);
        out.push(arg as u8);
    } else if arg <= u64::from(u16::MAX) {
        out.push(major | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= u64::from(u32::MAX) {
        out.push(major | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(major | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(encode(&json!(null)).expect("enc"), vec![0xf6]);
        assert_eq!(encode(&json!(false)).expect("enc"), vec![0xf4]);
        assert_eq!(encode(&json!(true)).expect("enc"), vec![0xf5]);
    }

    #[test]
    fn integer_widths() {
        assert_eq!(encode(&json!(0)).expect("enc"), vec![0x00]);
        assert_eq!(encode(&json!(23)).expect("enc"), vec![0x17]);
        assert_eq!(encode(&json!(24)).expect("enc"), vec![0x18, 0x18]);
        assert_eq!(encode(&json!(256)).expect("enc"), vec![0x19, 0x01, 0x00]);
        assert_eq!(
            encode(&json!(65536)).expect("enc"),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            encode(&json!(u64::MAX)).expect("enc"),
            vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn negative_integers() {
        assert_eq!(encode(&json!(-1)).expect("enc"), vec![0x20]);
        assert_eq!(encode(&json!(-100)).expect("enc"), vec![0x38, 0x63]);
        assert_eq!(
            encode(&json!(i64::MIN)).expect("enc"),
            vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn floats_always_use_eight_bytes() {
        // 1.5 fits in a half-float; DAG-CBOR still wants binary64
        assert_eq!(
            encode(&json!(1.5)).expect("enc"),
            vec![0xfb, 0x3f, 0xf8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn text_and_arrays() {
        assert_eq!(encode(&json!("a")).expect("enc"), vec![0x61, b'a']);
        assert_eq!(
            encode(&json!([1, "b"])).expect("enc"),
            vec![0x82, 0x01, 0x61, b'b']
        );
    }

    #[test]
    fn map_keys_sort_length_first() {
        // "b" (len 1) before "aa" (len 2), even though "aa" < "b" bytewise
        let bytes = encode(&json!({"aa": 1, "b": 2})).expect("enc");
        assert_eq!(bytes, vec![0xa2, 0x61, b'b', 0x02, 0x62, b'a', b'a', 0x01]);
    }

    #[test]
    fn map_insertion_order_is_irrelevant() {
        let mut first = serde_json::Map::new();
        first.insert("title".into(), json!("Hello"));
        first.insert("$type".into(), json!("app.nbhd.blog.post"));

        let mut second = serde_json::Map::new();
        second.insert("$type".into(), json!("app.nbhd.blog.post"));
        second.insert("title".into(), json!("Hello"));

        assert_eq!(
            encode(&Value::Object(first)).expect("enc"),
            encode(&Value::Object(second)).expect("enc")
        );
    }

    #[test]
    fn excessive_nesting_rejected() {
        let mut value = json!(1);
        for _ in 0..=MAX_ENCODING_DEPTH {
            value = json!([value]);
        }
        assert!(matches!(encode(&value), Err(NbhdError::Encoding(_))));
    }
}
