//! Nested records stored as `M` values.

use std::fmt;
use std::sync::Arc;

use dynamap_model::AttributeValue;

use super::{AttributeConverter, AttributeValueType, unexpected};
use crate::error::ConversionError;
use crate::schema::TableSchema;

/// Converts a nested record with its own schema. Absent nested fields are
/// omitted from the map.
pub struct RecordAttributeConverter<R> {
    schema: Arc<TableSchema<R>>,
}

impl<R> fmt::Debug for RecordAttributeConverter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordAttributeConverter")
            .field("record", &std::any::type_name::<R>())
            .finish()
    }
}

impl<R> RecordAttributeConverter<R> {
    /// Create a converter for records described by `schema`.
    #[must_use]
    pub fn new(schema: Arc<TableSchema<R>>) -> Self {
        Self { schema }
    }
}

impl<R: Default> AttributeConverter<R> for RecordAttributeConverter<R> {
    fn transform_from(&self, input: &R) -> Result<AttributeValue, ConversionError> {
        self.schema.item_from(input, true).map(AttributeValue::M)
    }

    fn transform_to(&self, input: &AttributeValue) -> Result<R, ConversionError> {
        match input {
            AttributeValue::M(map) => self.schema.record_from(map),
            other => Err(unexpected(AttributeValueType::M, other)),
        }
    }

    fn attribute_value_type(&self) -> AttributeValueType {
        AttributeValueType::M
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Address {
        street: Option<String>,
        zip: Option<u32>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Person {
        id: String,
        home: Option<Address>,
    }

    fn address_schema() -> Arc<TableSchema<Address>> {
        Arc::new(
            TableSchema::<Address>::builder()
                .attribute(
                    Attribute::new("street", |a: &Address| a.street.clone(), |a, v| a.street = v)
                        .partition_key(),
                )
                .attribute(Attribute::new("zip", |a: &Address| a.zip, |a, v| a.zip = v))
                .build()
                .expect("address schema"),
        )
    }

    #[test]
    fn test_should_nest_record_as_map() {
        let person_schema = TableSchema::<Person>::builder()
            .attribute(
                Attribute::new("id", |p: &Person| Some(p.id.clone()), |p, v| p.id = v.unwrap_or_default())
                    .partition_key(),
            )
            .attribute(
                Attribute::new("home", |p: &Person| p.home.clone(), |p, v| p.home = v)
                    .converter(RecordAttributeConverter::new(address_schema())),
            )
            .build()
            .expect("person schema");

        let person = Person {
            id: "p1".to_owned(),
            home: Some(Address {
                street: Some("Main".to_owned()),
                zip: None,
            }),
        };
        let item = person_schema.item_from(&person, true).expect("item");
        let home = item.get("home").and_then(AttributeValue::as_m).expect("map");
        assert_eq!(home.len(), 1);
        assert_eq!(home.get("street"), Some(&AttributeValue::S("Main".to_owned())));
        assert_eq!(person_schema.record_from(&item).expect("record"), person);
    }

    #[test]
    fn test_should_reject_non_map_for_record() {
        let conv = RecordAttributeConverter::new(address_schema());
        assert!(conv.transform_to(&AttributeValue::S("x".to_owned())).is_err());
    }
}
