//! # Frontmatter Schema Inference
//!
//! Turns a sample of Markdown frontmatter documents into a JSON-Schema
//! shaped description: one property per field with an inferred type, and a
//! `required` list of the fields present in strictly more than 80% of the
//! samples.
//!
//! Inference is permissive. Template content is user-authored and often
//! inconsistent, so anything that does not fit a single type falls back to
//! `string` instead of failing.

use crate::primitives::{INTERNAL_FIELD_PREFIX, REQUIRED_DENOMINATOR, REQUIRED_NUMERATOR};
use crate::FrontmatterSample;
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

// =============================================================================
// SCHEMA TYPES
// =============================================================================

/// A JSON Schema primitive type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl JsonType {
    /// The JSON Schema spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Scalar type of a single raw value.
    ///
    /// Null has no JSON Schema counterpart here and maps to `string`.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null | Value::String(_) => Self::String,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of array items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSchema {
    #[serde(rename = "type")]
    pub kind: JsonType,
}

/// Inferred schema of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub kind: JsonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl FieldSchema {
    /// A bare schema of the given type.
    #[must_use]
    pub const fn of(kind: JsonType) -> Self {
        Self {
            kind,
            format: None,
            items: None,
            title: None,
        }
    }

    fn date_time() -> Self {
        Self {
            format: Some("date-time".to_string()),
            ..Self::of(JsonType::String)
        }
    }

    fn array_of(items: Option<JsonType>) -> Self {
        Self {
            items: items.map(|kind| ItemSchema { kind }),
            ..Self::of(JsonType::Array)
        }
    }
}

/// Field schemas in first-encountered order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Properties(Vec<(String, FieldSchema)>);

impl Properties {
    /// Look up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Iterate fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.0.iter().map(|(n, s)| (n.as_str(), s))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, schema) in &self.0 {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

/// Inferred object schema for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredSchema {
    /// Always `object`.
    #[serde(rename = "type")]
    pub kind: JsonType,
    pub properties: Properties,
    /// Required field names, in first-encountered order.
    pub required: Vec<String>,
}

impl InferredSchema {
    /// `{type: object, properties: {}, required: []}`
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: JsonType::Object,
            properties: Properties::default(),
            required: Vec::new(),
        }
    }

    /// Whether a field made it into `required`.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Infer the schema of one field from its sample values.
///
/// Nulls are ignored. Checks run in priority order: all ISO-8601 strings,
/// all arrays, all booleans, all numbers, all objects; anything else is a
/// `string`.
#[must_use]
pub fn infer_field_type(values: &[Value]) -> FieldSchema {
    let refs: Vec<&Value> = values.iter().collect();
    infer_from_refs(&refs)
}

fn infer_from_refs(values: &[&Value]) -> FieldSchema {
    let values: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();

    if values.is_empty() {
        return FieldSchema::of(JsonType::String);
    }

    if values
        .iter()
        .all(|v| v.as_str().is_some_and(is_iso_date))
    {
        return FieldSchema::date_time();
    }

    if values.iter().all(|v| v.is_array()) {
        let first_item = values
            .iter()
            .filter_map(|v| v.as_array())
            .find_map(|items| items.first());
        return FieldSchema::array_of(first_item.map(JsonType::of));
    }

    if values.iter().all(|v| v.is_boolean()) {
        return FieldSchema::of(JsonType::Boolean);
    }

    if values.iter().all(|v| v.is_number()) {
        return FieldSchema::of(JsonType::Number);
    }

    if values.iter().all(|v| v.is_object()) {
        return FieldSchema::of(JsonType::Object);
    }

    FieldSchema::of(JsonType::String)
}

/// Infer an object schema from frontmatter samples.
///
/// Fields starting with `_` are internal and skipped. A field is required
/// when its non-null occurrence rate is strictly above 80%; exactly 80% is
/// optional.
#[must_use]
pub fn infer_schema(samples: &[FrontmatterSample]) -> InferredSchema {
    if samples.is_empty() {
        return InferredSchema::empty();
    }

    let total = samples.len();

    // field name -> position in `fields`
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut fields: Vec<(&str, Vec<&Value>)> = Vec::new();

    for sample in samples {
        for (name, value) in sample {
            if name.starts_with(INTERNAL_FIELD_PREFIX) {
                continue;
            }
            let slot = *index.entry(name.as_str()).or_insert_with(|| {
                fields.push((name.as_str(), Vec::new()));
                fields.len() - 1
            });
            fields[slot].1.push(value);
        }
    }

    let mut schema = InferredSchema::empty();

    for (name, values) in fields {
        let mut field = infer_from_refs(&values);
        field.title = Some(field_title(name));
        schema.properties.0.push((name.to_string(), field));

        let present = values.iter().filter(|v| !v.is_null()).count();
        if present * REQUIRED_DENOMINATOR > total * REQUIRED_NUMERATOR {
            schema.required.push(name.to_string());
        }
    }

    schema
}

/// Human-readable title for a field name.
///
/// Underscores and hyphens become spaces; each word is capitalised and the
/// rest lowercased. A letter following a non-letter starts a new word, so
/// `og_image2x` becomes `Og Image2X`.
#[must_use]
pub fn field_title(name: &str) -> String {
    let mut title = String::with_capacity(name.len());
    let mut in_word = false;

    for ch in name.chars() {
        let ch = if ch == '_' || ch == '-' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if in_word {
                title.extend(ch.to_lowercase());
            } else {
                title.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            title.push(ch);
            in_word = false;
        }
    }

    title
}

/// Shape of an ISO-8601 date or date-time, in extended (`2026-01-01T10:30`)
/// or basic (`20260101T1030`) form. Field ranges are checked separately.
static ISO_DATE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<date>[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{8})",
        r"(?:[T ](?P<time>[0-9]{2}(?::[0-9]{2}(?::[0-9]{2}(?:\.[0-9]{1,6})?)?)?",
        r"|[0-9]{4}(?:[0-9]{2}(?:\.[0-9]{1,6})?)?)",
        r"(?P<offset>Z|[+-][0-9]{2}(?::?[0-9]{2})?)?)?$",
    ))
});

/// Whether a string is an ISO-8601 date or date-time.
///
/// Accepts `YYYY-MM-DD` or `YYYYMMDD`, optionally followed by `T` or a space
/// and `HH[:MM[:SS[.ffffff]]]` (or the colon-free form), then an optional
/// `Z` or `±HH[:MM]` offset. Single-digit fields, two-digit years, and
/// surrounding whitespace are rejected.
#[must_use]
pub fn is_iso_date(value: &str) -> bool {
    let Ok(pattern) = ISO_DATE.as_ref() else {
        return false;
    };
    let Some(caps) = pattern.captures(value) else {
        return false;
    };

    let date = caps.name("date").map(|m| digits(m.as_str())).unwrap_or_default();
    let valid_date = match (number(&date, 0..4), number(&date, 4..6), number(&date, 6..8)) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d).is_some(),
        _ => false,
    };
    if !valid_date {
        return false;
    }

    if let Some(time) = caps.name("time") {
        let whole = time.as_str().split('.').next().unwrap_or_default();
        let time = digits(whole);
        let hour = number(&time, 0..2);
        let minute = number(&time, 2..4).or(Some(0));
        let second = number(&time, 4..6).or(Some(0));
        let valid_time = match (hour, minute, second) {
            (Some(h), Some(m), Some(s)) => NaiveTime::from_hms_opt(h, m, s).is_some(),
            _ => false,
        };
        if !valid_time {
            return false;
        }
    }

    match caps.name("offset").map(|m| m.as_str()) {
        None | Some("Z") => true,
        Some(offset) => {
            let offset = digits(offset);
            let hours = number(&offset, 0..2);
            let minutes = number(&offset, 2..4).or(Some(0));
            matches!((hours, minutes), (Some(h), Some(m)) if h < 24 && m < 60)
        }
    }
}

fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

fn number(digits: &str, range: Range<usize>) -> Option<u32> {
    digits.get(range)?.parse().ok()
}

// =============================================================================
// TESTS
// =============================================================================
