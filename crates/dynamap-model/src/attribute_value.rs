//! `AttributeValue`, the wire representation of a single item attribute.
//!
//! `AttributeValue` is a tagged union where exactly one variant is present.
//! The JSON wire format uses single-key objects like `{"S": "hello"}`.
//!
//! Equality is structural with one twist: the three set variants compare as
//! sets, so `{"SS": ["a", "b"]}` equals `{"SS": ["b", "a"]}`. Lists stay
//! order-sensitive and maps are key-unordered.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A wire item: attribute name to attribute value.
pub type Item = HashMap<String, AttributeValue>;

/// DynamoDB attribute value.
///
/// Numbers are always string-encoded to preserve arbitrary precision.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    /// String value.
    S(String),
    /// Number value (string-encoded for arbitrary precision).
    N(String),
    /// Binary value (base64-encoded in JSON).
    B(bytes::Bytes),
    /// String Set.
    Ss(Vec<String>),
    /// Number Set (string-encoded).
    Ns(Vec<String>),
    /// Binary Set (base64-encoded in JSON).
    Bs(Vec<bytes::Bytes>),
    /// Boolean value.
    Bool(bool),
    /// Null marker.
    Null(bool),
    /// List of attribute values.
    L(Vec<AttributeValue>),
    /// Map of attribute values.
    M(HashMap<String, AttributeValue>),
}

/// Structural problems detected by [`AttributeValue::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValueError {
    /// A set variant holds no elements.
    EmptySet {
        /// Type descriptor of the offending set (`SS`, `NS` or `BS`).
        set_type: &'static str,
    },
    /// A set variant holds the same element twice.
    DuplicateSetElement {
        /// Type descriptor of the offending set.
        set_type: &'static str,
        /// Display form of the duplicated element.
        element: String,
    },
    /// An `N` or `NS` element is not a decimal number.
    InvalidNumber {
        /// The offending text.
        value: String,
    },
}

impl fmt::Display for AttributeValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySet { set_type } => write!(f, "{set_type} must not be empty"),
            Self::DuplicateSetElement { set_type, element } => {
                write!(f, "{set_type} contains duplicate element {element}")
            }
            Self::InvalidNumber { value } => write!(f, "'{value}' is not a valid number"),
        }
    }
}

impl std::error::Error for AttributeValueError {}

impl AttributeValue {
    /// The null marker, `{"NULL": true}`.
    #[must_use]
    pub fn null() -> Self {
        Self::Null(true)
    }

    /// Build an `N` value from anything with a decimal `Display` form.
    #[must_use]
    pub fn number(value: impl fmt::Display) -> Self {
        Self::N(value.to_string())
    }

    /// Returns `true` if this is a string value.
    #[must_use]
    pub fn is_s(&self) -> bool {
        matches!(self, Self::S(_))
    }

    /// Returns `true` if this is a number value.
    #[must_use]
    pub fn is_n(&self) -> bool {
        matches!(self, Self::N(_))
    }

    /// Returns `true` if this is a binary value.
    #[must_use]
    pub fn is_b(&self) -> bool {
        matches!(self, Self::B(_))
    }

    /// Returns `true` if this is a boolean value.
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns `true` if this is the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }

    /// Returns `true` for the three set variants.
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Ss(_) | Self::Ns(_) | Self::Bs(_))
    }

    /// Returns `true` if this is a list value.
    #[must_use]
    pub fn is_l(&self) -> bool {
        matches!(self, Self::L(_))
    }

    /// Returns `true` if this is a map value.
    #[must_use]
    pub fn is_m(&self) -> bool {
        matches!(self, Self::M(_))
    }

    /// Returns the string value if this is an `S` variant.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number string if this is an `N` variant.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the bytes if this is a `B` variant.
    #[must_use]
    pub fn as_b(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the map if this is an `M` variant.
    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the list if this is an `L` variant.
    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool` variant.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the DynamoDB type descriptor string (e.g., "S", "N", "BOOL").
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }

    /// Check the set invariants (non-empty, unique elements) and number
    /// syntax, recursing into lists and maps.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), AttributeValueError> {
        match self {
            Self::N(n) => validate_number(n),
            Self::Ss(v) => validate_set("SS", v, |s| s.clone()),
            Self::Ns(v) => {
                for n in v {
                    validate_number(n)?;
                }
                validate_set("NS", v, |s| s.clone())
            }
            Self::Bs(v) => validate_set("BS", v, |b| format!("{} bytes", b.len())),
            Self::L(list) => list.iter().try_for_each(Self::validate),
            Self::M(map) => map.values().try_for_each(Self::validate),
            Self::S(_) | Self::B(_) | Self::Bool(_) | Self::Null(_) => Ok(()),
        }
    }
}

fn validate_set<T: PartialEq>(
    set_type: &'static str,
    elements: &[T],
    describe: impl Fn(&T) -> String,
) -> Result<(), AttributeValueError> {
    if elements.is_empty() {
        return Err(AttributeValueError::EmptySet { set_type });
    }
    for (i, e) in elements.iter().enumerate() {
        if elements[..i].contains(e) {
            return Err(AttributeValueError::DuplicateSetElement {
                set_type,
                element: describe(e),
            });
        }
    }
    Ok(())
}

fn validate_number(n: &str) -> Result<(), AttributeValueError> {
    let trimmed = n.trim();
    let charset_ok = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if trimmed.is_empty() || !charset_ok || trimmed.parse::<f64>().is_err() {
        return Err(AttributeValueError::InvalidNumber {
            value: n.to_owned(),
        });
    }
    Ok(())
}

fn sorted<T: Ord + Clone>(v: &[T]) -> Vec<T> {
    let mut out = v.to_vec();
    out.sort();
    out
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::S(a), Self::S(b)) | (Self::N(a), Self::N(b)) => a == b,
            (Self::B(a), Self::B(b)) => a == b,
            (Self::Ss(a), Self::Ss(b)) | (Self::Ns(a), Self::Ns(b)) => {
                a.len() == b.len() && sorted(a) == sorted(b)
            }
            (Self::Bs(a), Self::Bs(b)) => a.len() == b.len() && sorted(a) == sorted(b),
            (Self::Bool(a), Self::Bool(b)) | (Self::Null(a), Self::Null(b)) => a == b,
            (Self::L(a), Self::L(b)) => a == b,
            (Self::M(a), Self::M(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl std::hash::Hash for AttributeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::S(s) | Self::N(s) => s.hash(state),
            Self::B(b) => b.hash(state),
            Self::Bool(b) | Self::Null(b) => b.hash(state),
            // Sets hash in sorted order so that equal sets hash equally.
            Self::Ss(v) | Self::Ns(v) => sorted(v).hash(state),
            Self::Bs(v) => sorted(v).hash(state),
            Self::L(v) => v.hash(state),
            Self::M(m) => {
                let mut pairs: Vec<_> = m.iter().collect();
                pairs.sort_by_key(|(k, _)| *k);
                for (k, v) in pairs {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{{S: {s}}}"),
            Self::N(n) => write!(f, "{{N: {n}}}"),
            Self::B(b) => write!(f, "{{B: {} bytes}}", b.len()),
            Self::Ss(v) => write!(f, "{{SS: {v:?}}}"),
            Self::Ns(v) => write!(f, "{{NS: {v:?}}}"),
            Self::Bs(v) => write!(f, "{{BS: {} items}}", v.len()),
            Self::Bool(b) => write!(f, "{{BOOL: {b}}}"),
            Self::Null(b) => write!(f, "{{NULL: {b}}}"),
            Self::L(v) => write!(f, "{{L: {} items}}", v.len()),
            Self::M(m) => write!(f, "{{M: {} keys}}", m.len()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(b);
                map.serialize_entry("B", &encoded)?;
            }
            Self::Ss(v) => map.serialize_entry("SS", v)?,
            Self::Ns(v) => map.serialize_entry("NS", v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v
                    .iter()
                    .map(|b| base64::engine::general_purpose::STANDARD.encode(b))
                    .collect();
                map.serialize_entry("BS", &encoded)?;
            }
            Self::Bool(b) => map.serialize_entry("BOOL", b)?,
            Self::Null(b) => map.serialize_entry("NULL", b)?,
            Self::L(list) => map.serialize_entry("L", list)?,
            Self::M(m) => map.serialize_entry("M", m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an AttributeValue object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        use base64::Engine;

        let Some(key) = map.next_key::<String>()? else {
            return Err(de::Error::custom(
                "AttributeValue must have exactly one key",
            ));
        };

        let value = match key.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => {
                let encoded: String = map.next_value()?;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(&encoded)
                    .map_err(de::Error::custom)?;
                AttributeValue::B(bytes::Bytes::from(decoded))
            }
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                let decoded: Result<Vec<bytes::Bytes>, _> = encoded
                    .iter()
                    .map(|e| {
                        base64::engine::general_purpose::STANDARD
                            .decode(e)
                            .map(bytes::Bytes::from)
                    })
                    .collect();
                AttributeValue::Bs(decoded.map_err(de::Error::custom)?)
            }
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            other => {
                return Err(de::Error::unknown_field(
                    other,
                    &["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"],
                ));
            }
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom(
                "AttributeValue must have exactly one key",
            ));
        }

        Ok(value)
    }
}
