//! Typed field values and their wire representation
//!
//! On the wire every value is an object with a single key naming its kind:
//!
//! ```json
//! { "stringValue": "Groceries" }
//! { "integerValue": "42" }
//! { "arrayValue": { "values": [{ "booleanValue": true }] } }
//! { "mapValue": { "fields": { "done": { "booleanValue": false } } } }
//! ```

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::Error as _;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value as Json;

use crate::error::Error;
use crate::error::Result;

/// A typed document field value
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Name of the wire kind, as used in errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "nullValue",
            Value::Boolean(_) => "booleanValue",
            Value::Integer(_) => "integerValue",
            Value::Double(_) => "doubleValue",
            Value::Timestamp(_) => "timestampValue",
            Value::String(_) => "stringValue",
            Value::Array(_) => "arrayValue",
            Value::Map(_) => "mapValue",
        }
    }

    /// Wire representation of the value
    pub fn to_wire(&self) -> Json {
        let inner = match self {
            Value::Null => Json::Null,
            Value::Boolean(value) => Json::Bool(*value),
            // 64-bit integers travel as strings to survive JSON number precision
            Value::Integer(value) => Json::String(value.to_string()),
            Value::Double(value) => double_to_wire(*value),
            Value::Timestamp(value) => {
                Json::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::String(value) => Json::String(value.clone()),
            Value::Array(values) => {
                let mut array = Map::new();
                if !values.is_empty() {
                    array.insert(
                        "values".to_string(),
                        Json::Array(values.iter().map(Value::to_wire).collect()),
                    );
                }
                Json::Object(array)
            }
            Value::Map(fields) => {
                let mut map = Map::new();
                if !fields.is_empty() {
                    map.insert("fields".to_string(), fields_to_wire(fields));
                }
                Json::Object(map)
            }
        };

        let mut wrapper = Map::new();
        wrapper.insert(self.kind().to_string(), inner);

        Json::Object(wrapper)
    }

    /// Parse a wire representation
    ///
    /// # Errors
    ///
    /// Will return `Err` for unknown kinds and for payloads that do not match their kind
    pub fn from_wire(wire: &Json) -> Result<Self> {
        let Json::Object(wrapper) = wire else {
            return Err(Error::Codec(format!("Expected a value object, got {wire}")));
        };

        let mut entries = wrapper.iter();
        let (Some((kind, inner)), None) = (entries.next(), entries.next()) else {
            return Err(Error::Codec(format!(
                "Expected exactly one value kind, got {} keys",
                wrapper.len()
            )));
        };

        match kind.as_str() {
            "nullValue" => match inner {
                Json::Null => Ok(Value::Null),
                Json::String(null) if null == "NULL_VALUE" => Ok(Value::Null),
                other => Err(mismatch(kind, other)),
            },
            "booleanValue" => inner
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| mismatch(kind, inner)),
            "integerValue" => match inner {
                Json::String(value) => value
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| mismatch(kind, inner)),
                Json::Number(value) => value
                    .as_i64()
                    .map(Value::Integer)
                    .ok_or_else(|| mismatch(kind, inner)),
                other => Err(mismatch(kind, other)),
            },
            "doubleValue" => double_from_wire(inner).ok_or_else(|| mismatch(kind, inner)),
            "timestampValue" => inner
                .as_str()
                .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
                .map(|value| Value::Timestamp(value.with_timezone(&Utc)))
                .ok_or_else(|| mismatch(kind, inner)),
            "stringValue" => inner
                .as_str()
                .map(|value| Value::String(value.to_string()))
                .ok_or_else(|| mismatch(kind, inner)),
            "arrayValue" => {
                let Json::Object(array) = inner else {
                    return Err(mismatch(kind, inner));
                };

                match array.get("values") {
                    None => Ok(Value::Array(Vec::new())),
                    Some(Json::Array(values)) => values
                        .iter()
                        .map(Value::from_wire)
                        .collect::<Result<Vec<_>>>()
                        .map(Value::Array),
                    Some(other) => Err(mismatch(kind, other)),
                }
            }
            "mapValue" => {
                let Json::Object(map) = inner else {
                    return Err(mismatch(kind, inner));
                };

                match map.get("fields") {
                    None => Ok(Value::Map(BTreeMap::new())),
                    Some(fields) => fields_from_wire(fields).map(Value::Map),
                }
            }
            unsupported => Err(Error::UnsupportedValue(unsupported.to_string())),
        }
    }

    /// Convert a plain JSON value
    ///
    /// Strings stay strings, timestamps can not be detected from plain JSON
    ///
    /// # Errors
    ///
    /// Will return `Err` for integers that do not fit in 64 signed bits
    pub fn from_json(json: &Json) -> Result<Self> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(value) => Ok(Value::Boolean(*value)),
            Json::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(Value::Integer(value))
                } else if number.is_u64() {
                    Err(Error::UnsupportedValue(format!(
                        "Integer {number} does not fit in 64 signed bits"
                    )))
                } else {
                    number
                        .as_f64()
                        .map(Value::Double)
                        .ok_or_else(|| Error::UnsupportedValue(format!("Number {number}")))
                }
            }
            Json::String(value) => Ok(Value::String(value.clone())),
            Json::Array(values) => values
                .iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Json::Object(map) => map
                .iter()
                .map(|(key, value)| Ok((key.clone(), Value::from_json(value)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Map),
        }
    }

    /// Convert into plain JSON
    ///
    /// # Errors
    ///
    /// Will return `Err` for doubles JSON can not represent (NaN and infinities)
    pub fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Value::Null => Json::Null,
            Value::Boolean(value) => Json::Bool(*value),
            Value::Integer(value) => Json::Number((*value).into()),
            Value::Double(value) => Number::from_f64(*value)
                .map(Json::Number)
                .ok_or_else(|| Error::UnsupportedValue(format!("Double {value}")))?,
            Value::Timestamp(value) => {
                Json::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::String(value) => Json::String(value.clone()),
            Value::Array(values) => Json::Array(
                values
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), value.to_json()?)))
                    .collect::<Result<Map<_, _>>>()?,
            ),
        })
    }
}

/// Wire representation of a field map
pub(crate) fn fields_to_wire(fields: &BTreeMap<String, Value>) -> Json {
    Json::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_wire()))
            .collect(),
    )
}

/// Parse the wire representation of a field map
pub(crate) fn fields_from_wire(wire: &Json) -> Result<BTreeMap<String, Value>> {
    let Json::Object(fields) = wire else {
        return Err(Error::Codec(format!("Expected a fields object, got {wire}")));
    };

    fields
        .iter()
        .map(|(key, value)| {
            Value::from_wire(value)
                .map(|value| (key.clone(), value))
                .map_err(|err| match err {
                    Error::Codec(message) => Error::Codec(format!("Field `{key}`: {message}")),
                    err => err,
                })
        })
        .collect()
}

fn double_to_wire(value: f64) -> Json {
    if value.is_nan() {
        Json::String("NaN".to_string())
    } else if value == f64::INFINITY {
        Json::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        Json::String("-Infinity".to_string())
    } else {
        Number::from_f64(value).map_or(Json::Null, Json::Number)
    }
}

fn double_from_wire(wire: &Json) -> Option<Value> {
    match wire {
        Json::Number(number) => number.as_f64().map(Value::Double),
        Json::String(special) => match special.as_str() {
            "NaN" => Some(Value::Double(f64::NAN)),
            "Infinity" => Some(Value::Double(f64::INFINITY)),
            "-Infinity" => Some(Value::Double(f64::NEG_INFINITY)),
            _ => None,
        },
        _ => None,
    }
}

fn mismatch(kind: &str, payload: &Json) -> Error {
    Error::Codec(format!("Invalid payload for `{kind}`: {payload}"))
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = Json::deserialize(deserializer)?;

        Value::from_wire(&wire).map_err(D::Error::custom)
    }
}
