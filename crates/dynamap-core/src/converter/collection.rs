//! Collection converters: lists, string/number sets and string-keyed maps.
//!
//! Sets are emitted with sorted elements so the same logical set always
//! produces the same wire text. An empty set has no wire representation and
//! is emitted as the null marker, which the schema treats as an absent value.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use dynamap_model::AttributeValue;

use super::scalar::{WireNumber, parse_number};
use super::{AttributeConverter, AttributeValueType, unexpected};
use crate::error::ConversionError;

/// `Vec<V>` as `L`, converting each element with the element converter.
pub struct ListConverter<V> {
    element: Arc<dyn AttributeConverter<V>>,
}

impl<V> std::fmt::Debug for ListConverter<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListConverter")
            .field("element", &self.element.attribute_value_type())
            .finish()
    }
}

impl<V> ListConverter<V> {
    /// Create a list converter from an element converter.
    #[must_use]
    pub fn new(element: Arc<dyn AttributeConverter<V>>) -> Self {
        Self { element }
    }
}

impl<V> AttributeConverter<Vec<V>> for ListConverter<V> {
    fn transform_from(&self, input: &Vec<V>) -> Result<AttributeValue, ConversionError> {
        input
            .iter()
            .map(|v| self.element.transform_from(v))
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::L)
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<Vec<V>, ConversionError> {
        match input {
            AttributeValue::L(items) => items.iter().map(|v| self.element.transform_to(v)).collect(),
            other => Err(unexpected(AttributeValueType::L, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::L
    }
}

/// `HashMap<String, V>` as `M`.
pub struct MapConverter<V> {
    value: Arc<dyn AttributeConverter<V>>,
}

impl<V> std::fmt::Debug for MapConverter<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapConverter")
            .field("value", &self.value.attribute_value_type())
            .finish()
    }
}

impl<V> MapConverter<V> {
    /// Create a map converter from a value converter.
    #[must_use]
    pub fn new(value: Arc<dyn AttributeConverter<V>>) -> Self {
        Self { value }
    }
}

impl<V> AttributeConverter<HashMap<String, V>> for MapConverter<V> {
    fn transform_from(&self, input: &HashMap<String, V>) -> Result<AttributeValue, ConversionError> {
        input
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.value.transform_from(v)?)))
            .collect::<Result<HashMap<_, _>, ConversionError>>()
            .map(AttributeValue::M)
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<HashMap<String, V>, ConversionError> {
        match input {
            AttributeValue::M(map) => map
                .iter()
                .map(|(k, v)| {
                    let value = self
                        .value
                        .transform_to(v)
                        .map_err(|e| e.for_attribute(k))?;
                    Ok((k.clone(), value))
                })
                .collect(),
            other => Err(unexpected(AttributeValueType::M, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::M
    }
}

/// A string set type (`HashSet<String>`, `BTreeSet<String>`) as `SS`.
#[derive(Debug)]
pub struct StringSetConverter<S> {
    _marker: PhantomData<fn() -> S>,
}

impl<S> StringSetConverter<S> {
    /// Create a string set converter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S> Default for StringSetConverter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> AttributeConverter<S> for StringSetConverter<S>
where
    S: FromIterator<String>,
    for<'a> &'a S: IntoIterator<Item = &'a String>,
{
    fn transform_from(&self, input: &S) -> Result<AttributeValue, ConversionError> {
        let mut elements: Vec<String> = input.into_iter().cloned().collect();
        if elements.is_empty() {
            return Ok(AttributeValue::null());
        }
        elements.sort();
        Ok(AttributeValue::Ss(elements))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<S, ConversionError> {
        match input {
            AttributeValue::Ss(elements) => Ok(elements.iter().cloned().collect()),
            other => Err(unexpected(AttributeValueType::Ss, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::Ss
    }
}

/// A number set type (`HashSet<i64>`, `BTreeSet<i64>`) as `NS`.
#[derive(Debug)]
pub struct NumberSetConverter<S, N> {
    _marker: PhantomData<fn() -> (S, N)>,
}

impl<S, N> NumberSetConverter<S, N> {
    /// Create a number set converter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S, N> Default for NumberSetConverter<S, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> AttributeConverter<S> for NumberSetConverter<S, N>
where
    N: WireNumber + PartialOrd,
    S: FromIterator<N>,
    for<'a> &'a S: IntoIterator<Item = &'a N>,
{
    fn transform_from(&self, input: &S) -> Result<AttributeValue, ConversionError> {
        let mut numbers: Vec<N> = input.into_iter().copied().collect();
        if numbers.is_empty() {
            return Ok(AttributeValue::null());
        }
        if let Some(bad) = numbers.iter().find(|n| !n.is_representable()) {
            return Err(ConversionError::InvalidNumber {
                value: bad.to_string(),
                target: N::NAME,
            });
        }
        numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(AttributeValue::Ns(numbers.iter().map(ToString::to_string).collect()))
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<S, ConversionError> {
        match input {
            AttributeValue::Ns(elements) => elements.iter().map(|e| parse_number::<N>(e)).collect(),
            other => Err(unexpected(AttributeValueType::Ns, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::Ns
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use super::*;
    use crate::converter::{NumberConverter, StringConverter};

    #[test]
    fn test_should_emit_sorted_string_set() {
        let conv = StringSetConverter::<HashSet<String>>::new();
        let set: HashSet<String> = ["b", "a", "c"].iter().map(|s| (*s).to_owned()).collect();
        let wire = conv.transform_from(&set).expect("to wire");
        assert_eq!(
            wire,
            AttributeValue::Ss(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()])
        );
        assert_eq!(conv.transform_to(&wire).ok(), Some(set));
    }

    #[test]
    fn test_should_map_empty_set_to_null_marker() {
        let conv = NumberSetConverter::<BTreeSet<i64>, i64>::new();
        let wire = conv.transform_from(&BTreeSet::new()).expect("to wire");
        assert!(wire.is_null());
    }

    #[test]
    fn test_should_round_trip_number_set() {
        let conv = NumberSetConverter::<BTreeSet<i64>, i64>::new();
        let set: BTreeSet<i64> = [10, -2, 7].into_iter().collect();
        let wire = conv.transform_from(&set).expect("to wire");
        assert_eq!(
            wire,
            AttributeValue::Ns(vec!["-2".to_owned(), "7".to_owned(), "10".to_owned()])
        );
        assert_eq!(conv.transform_to(&wire).ok(), Some(set));
    }

    #[test]
    fn test_should_keep_list_order() {
        let conv = ListConverter::new(Arc::new(NumberConverter::<i64>::new()));
        let wire = conv.transform_from(&vec![3, 1, 2]).expect("to wire");
        assert_eq!(conv.transform_to(&wire).ok(), Some(vec![3, 1, 2]));
        assert!(conv.transform_to(&AttributeValue::S("x".to_owned())).is_err());
    }

    #[test]
    fn test_should_name_failing_map_key() {
        let conv = MapConverter::new(Arc::new(StringConverter));
        let mut wire = HashMap::new();
        wire.insert("ok".to_owned(), AttributeValue::S("v".to_owned()));
        wire.insert("bad".to_owned(), AttributeValue::Bool(true));
        let err = conv
            .transform_to(&AttributeValue::M(wire))
            .expect_err("bad value");
        assert!(err.to_string().contains("'bad'"));
    }
}
