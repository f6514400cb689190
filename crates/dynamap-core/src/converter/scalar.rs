//! Scalar converters: strings, booleans, numbers, binary and timestamps.

use std::marker::PhantomData;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use dynamap_model::AttributeValue;

use super::{AttributeConverter, AttributeValueType, unexpected};
use crate::error::ConversionError;

/// `String` as `S`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl AttributeConverter<String> for StringConverter {
    fn transform_from(&self, input: &String) -> Result<AttributeValue, ConversionError> {
        Ok(AttributeValue::S(input.clone()))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<String, ConversionError> {
        match input {
            AttributeValue::S(s) => Ok(s.clone()),
            other => Err(unexpected(AttributeValueType::S, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::S
    }
}

/// `bool` as `BOOL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolConverter;

impl AttributeConverter<bool> for BoolConverter {
    fn transform_from(&self, input: &bool) -> Result<AttributeValue, ConversionError> {
        Ok(AttributeValue::Bool(*input))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<bool, ConversionError> {
        match input {
            AttributeValue::Bool(b) => Ok(*b),
            other => Err(unexpected(AttributeValueType::Bool, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::Bool
    }
}

/// A Rust number type carried as decimal text in an `N` value.
pub trait WireNumber: FromStr + ToString + Copy + Send + Sync + 'static {
    /// Type name used in error messages.
    const NAME: &'static str;

    /// `false` for values with no decimal representation (NaN, infinities).
    fn is_representable(&self) -> bool {
        true
    }
}

macro_rules! wire_integer {
    ($($t:ty),*) => {
        $(impl WireNumber for $t {
            const NAME: &'static str = stringify!($t);
        })*
    };
}

macro_rules! wire_float {
    ($($t:ty),*) => {
        $(impl WireNumber for $t {
            const NAME: &'static str = stringify!($t);

            fn is_representable(&self) -> bool {
                self.is_finite()
            }
        })*
    };
}

wire_integer!(i8, i16, i32, i64, u8, u16, u32, u64);
wire_float!(f32, f64);

/// Any [`WireNumber`] as `N`. Out-of-range wire numbers are rejected.
#[derive(Debug, Clone, Copy)]
pub struct NumberConverter<N> {
    _marker: PhantomData<fn() -> N>,
}

impl<N> Default for NumberConverter<N> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<N: WireNumber> NumberConverter<N> {
    /// Create a number converter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<N: WireNumber> AttributeConverter<N> for NumberConverter<N> {
    fn transform_from(&self, input: &N) -> Result<AttributeValue, ConversionError> {
        let text = input.to_string();
        if !input.is_representable() {
            return Err(ConversionError::InvalidNumber {
                value: text,
                target: N::NAME,
            });
        }
        Ok(AttributeValue::N(text))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<N, ConversionError> {
        let AttributeValue::N(text) = input else {
            return Err(unexpected(AttributeValueType::N, input));
        };
        parse_number(text)
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::N
    }
}

pub(crate) fn parse_number<N: WireNumber>(text: &str) -> Result<N, ConversionError> {
    text.trim()
        .parse::<N>()
        .ok()
        .filter(<N as WireNumber>::is_representable)
        .ok_or_else(|| ConversionError::InvalidNumber {
            value: text.to_owned(),
            target: N::NAME,
        })
}

/// `Bytes` as `B`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesConverter;

impl AttributeConverter<Bytes> for BytesConverter {
    fn transform_from(&self, input: &Bytes) -> Result<AttributeValue, ConversionError> {
        Ok(AttributeValue::B(input.clone()))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<Bytes, ConversionError> {
        match input {
            AttributeValue::B(b) => Ok(b.clone()),
            other => Err(unexpected(AttributeValueType::B, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::B
    }
}

/// `Vec<u8>` as `B`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteVecConverter;

impl AttributeConverter<Vec<u8>> for ByteVecConverter {
    fn transform_from(&self, input: &Vec<u8>) -> Result<AttributeValue, ConversionError> {
        Ok(AttributeValue::B(Bytes::copy_from_slice(input)))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<Vec<u8>, ConversionError> {
        match input {
            AttributeValue::B(b) => Ok(b.to_vec()),
            other => Err(unexpected(AttributeValueType::B, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::B
    }
}

/// `DateTime<Utc>` as an ISO-8601 `S` value (`2024-01-01T10:00:00Z`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl DateTimeConverter {
    /// Render a timestamp the way this converter stores it.
    #[must_use]
    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Parse a stored timestamp.
    pub fn parse(text: &str) -> Result<DateTime<Utc>, ConversionError> {
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ConversionError::InvalidFormat {
                value: text.to_owned(),
                target: "DateTime<Utc>",
                reason: e.to_string(),
            })
    }
}

impl AttributeConverter<DateTime<Utc>> for DateTimeConverter {
    fn transform_from(&self, input: &DateTime<Utc>) -> Result<AttributeValue, ConversionError> {
        Ok(AttributeValue::S(Self::format(input)))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<DateTime<Utc>, ConversionError> {
        match input {
            AttributeValue::S(s) => Self::parse(s),
            other => Err(unexpected(AttributeValueType::S, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::S
    }
}
