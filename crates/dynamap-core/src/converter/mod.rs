//! Bidirectional converters between logical Rust values and wire values.
//!
//! A converter is resolved once per attribute when a schema is built. The
//! registry ([`ConverterProvider`]) is keyed by the attribute's `TypeId`, so
//! a missing converter is reported as a schema error rather than at call time.

mod collection;
mod record;
mod scalar;

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dynamap_model::AttributeValue;

pub use collection::{ListConverter, MapConverter, NumberSetConverter, StringSetConverter};
pub use record::RecordAttributeConverter;
pub use scalar::{
    BoolConverter, ByteVecConverter, BytesConverter, DateTimeConverter, NumberConverter,
    StringConverter, WireNumber,
};

use crate::error::ConversionError;

/// The wire type a converter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeValueType {
    /// String.
    S,
    /// Number.
    N,
    /// Binary.
    B,
    /// Boolean.
    Bool,
    /// Null marker.
    Null,
    /// String set.
    Ss,
    /// Number set.
    Ns,
    /// Binary set.
    Bs,
    /// List.
    L,
    /// Map.
    M,
}

impl AttributeValueType {
    /// Wire type descriptor (`"S"`, `"NS"`, ...).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
            Self::Bool => "BOOL",
            Self::Null => "NULL",
            Self::Ss => "SS",
            Self::Ns => "NS",
            Self::Bs => "BS",
            Self::L => "L",
            Self::M => "M",
        }
    }
}

impl fmt::Display for AttributeValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts one logical type `V` to and from its wire representation.
///
/// Implementations must satisfy `transform_to(transform_from(x)) == x` for
/// every representable `x`. The null marker never reaches a converter: the
/// schema maps it to an absent value before calling [`transform_to`].
///
/// [`transform_to`]: AttributeConverter::transform_to
pub trait AttributeConverter<V>: Send + Sync {
    /// Logical value to wire value.
    fn transform_from(&self, input: &V) -> Result<AttributeValue, ConversionError>;

    /// Wire value to logical value.
    fn transform_to(&self, input: &AttributeValue) -> Result<V, ConversionError>;

    /// Wire type produced by [`transform_from`](AttributeConverter::transform_from).
    fn attribute_value_type(&self) -> AttributeValueType;
}

/// Registry resolving converters by logical type.
///
/// The provider hands out type-erased entries; `converter_for` on
/// `dyn ConverterProvider` restores the concrete converter type.
pub trait ConverterProvider: Send + Sync + fmt::Debug {
    /// Look up the erased converter registered for `type_id`.
    ///
    /// The entry must be an `Arc<dyn AttributeConverter<V>>` for the `V`
    /// whose `TypeId` is `type_id`.
    fn erased_converter(&self, type_id: TypeId) -> Option<&(dyn Any + Send + Sync)>;
}

impl dyn ConverterProvider + '_ {
    /// Resolve the converter for `V`, or `None` if none is registered.
    #[must_use]
    pub fn converter_for<V: 'static>(&self) -> Option<Arc<dyn AttributeConverter<V>>> {
        self.erased_converter(TypeId::of::<V>())?
            .downcast_ref::<Arc<dyn AttributeConverter<V>>>()
            .cloned()
    }
}

/// Converter registry pre-populated with scalar types and common collections.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dynamap_core::converter::{ConverterProvider, DefaultConverterProvider};
///
/// let provider: Arc<dyn ConverterProvider> = Arc::new(DefaultConverterProvider::new());
/// assert!(provider.converter_for::<String>().is_some());
/// assert!(provider.converter_for::<std::time::Duration>().is_none());
/// ```
pub struct DefaultConverterProvider {
    converters: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    type_names: Vec<&'static str>,
}

impl fmt::Debug for DefaultConverterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultConverterProvider")
            .field("types", &self.type_names)
            .finish()
    }
}

impl Default for DefaultConverterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultConverterProvider {
    /// Create a provider with all built-in converters registered.
    #[must_use]
    pub fn new() -> Self {
        let mut provider = Self::empty();
        provider
            .register::<String>(StringConverter)
            .register::<bool>(BoolConverter)
            .register::<i8>(NumberConverter::<i8>::new())
            .register::<i16>(NumberConverter::<i16>::new())
            .register::<i32>(NumberConverter::<i32>::new())
            .register::<i64>(NumberConverter::<i64>::new())
            .register::<u8>(NumberConverter::<u8>::new())
            .register::<u16>(NumberConverter::<u16>::new())
            .register::<u32>(NumberConverter::<u32>::new())
            .register::<u64>(NumberConverter::<u64>::new())
            .register::<f32>(NumberConverter::<f32>::new())
            .register::<f64>(NumberConverter::<f64>::new())
            .register::<Bytes>(BytesConverter)
            .register::<Vec<u8>>(ByteVecConverter)
            .register::<DateTime<Utc>>(DateTimeConverter)
            .register::<HashSet<String>>(StringSetConverter::<HashSet<String>>::new())
            .register::<BTreeSet<String>>(StringSetConverter::<BTreeSet<String>>::new())
            .register::<HashSet<i64>>(NumberSetConverter::<HashSet<i64>, i64>::new())
            .register::<BTreeSet<i64>>(NumberSetConverter::<BTreeSet<i64>, i64>::new())
            .register::<Vec<String>>(ListConverter::new(Arc::new(StringConverter)))
            .register::<Vec<i64>>(ListConverter::new(Arc::new(NumberConverter::<i64>::new())))
            .register::<Vec<f64>>(ListConverter::new(Arc::new(NumberConverter::<f64>::new())))
            .register::<Vec<bool>>(ListConverter::new(Arc::new(BoolConverter)))
            .register::<HashMap<String, String>>(MapConverter::new(Arc::new(StringConverter)))
            .register::<HashMap<String, i64>>(MapConverter::new(Arc::new(
                NumberConverter::<i64>::new(),
            )))
            .register::<HashMap<String, bool>>(MapConverter::new(Arc::new(BoolConverter)));
        provider
    }

    /// Create a provider with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
            type_names: Vec::new(),
        }
    }

    /// Register (or replace) the converter for `V`.
    pub fn register<V: 'static>(
        &mut self,
        converter: impl AttributeConverter<V> + 'static,
    ) -> &mut Self {
        let erased: Arc<dyn AttributeConverter<V>> = Arc::new(converter);
        if self
            .converters
            .insert(TypeId::of::<V>(), Box::new(erased))
            .is_none()
        {
            self.type_names.push(std::any::type_name::<V>());
        }
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with<V: 'static>(mut self, converter: impl AttributeConverter<V> + 'static) -> Self {
        self.register(converter);
        self
    }
}

impl ConverterProvider for DefaultConverterProvider {
    fn erased_converter(&self, type_id: TypeId) -> Option<&(dyn Any + Send + Sync)> {
        self.converters.get(&type_id).map(|entry| &**entry)
    }
}

/// Error for a wire value of the wrong type.
pub(crate) fn unexpected(expected: AttributeValueType, actual: &AttributeValue) -> ConversionError {
    ConversionError::UnexpectedType {
        expected: expected.as_str(),
        actual: actual.type_descriptor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Celsius(f64);

    struct CelsiusConverter;

    impl AttributeConverter<Celsius> for CelsiusConverter {
        fn transform_from(&self, input: &Celsius) -> Result<AttributeValue, ConversionError> {
            Ok(AttributeValue::S(format!("{}C", input.0)))
        }

        fn transform_to(&self, input: &AttributeValue) -> Result<Celsius, ConversionError> {
            let s = input
                .as_s()
                .ok_or_else(|| unexpected(AttributeValueType::S, input))?;
            let n = s.trim_end_matches('C');
            n.parse().map(Celsius).map_err(|_| ConversionError::InvalidNumber {
                value: s.to_owned(),
                target: "Celsius",
            })
        }

        fn attribute_value_type(&self) -> AttributeValueType {
            AttributeValueType::S
        }
    }

    #[test]
    fn test_should_resolve_builtin_converters_by_type() {
        let provider: Arc<dyn ConverterProvider> = Arc::new(DefaultConverterProvider::new());
        let conv = provider.converter_for::<i32>().expect("i32 registered");
        assert_eq!(conv.attribute_value_type(), AttributeValueType::N);
        assert_eq!(conv.transform_from(&42).ok(), Some(AttributeValue::N("42".to_owned())));
        assert!(provider.converter_for::<HashSet<String>>().is_some());
        assert!(provider.converter_for::<Celsius>().is_none());
    }

    #[test]
    fn test_should_register_custom_converter() {
        let provider: Arc<dyn ConverterProvider> =
            Arc::new(DefaultConverterProvider::new().with::<Celsius>(CelsiusConverter));
        let conv = provider.converter_for::<Celsius>().expect("registered");
        let wire = conv.transform_from(&Celsius(21.5)).expect("to wire");
        assert_eq!(wire, AttributeValue::S("21.5C".to_owned()));
        assert_eq!(conv.transform_to(&wire).ok(), Some(Celsius(21.5)));
    }

    #[test]
    fn test_should_list_registered_types_in_debug() {
        let provider = DefaultConverterProvider::empty().with::<String>(StringConverter);
        assert!(format!("{provider:?}").contains("String"));
    }

    #[derive(Debug)]
    struct Borrowed<'a>(&'a DefaultConverterProvider);

    impl ConverterProvider for Borrowed<'_> {
        fn erased_converter(&self, type_id: TypeId) -> Option<&(dyn Any + Send + Sync)> {
            self.0.erased_converter(type_id)
        }
    }

    #[test]
    fn test_should_resolve_through_borrowing_provider() {
        let inner = DefaultConverterProvider::new();
        let borrowed = Borrowed(&inner);
        let provider: &dyn ConverterProvider = &borrowed;
        assert!(provider.converter_for::<String>().is_some());
        assert!(provider.converter_for::<Celsius>().is_none());
    }
}
