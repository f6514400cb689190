use chrono::{DateTime, Utc};
use dynamap_model::AttributeValue;

use super::{BeforeWriteContext, Extension, WriteModification};
use crate::converter::DateTimeConverter;
use crate::error::EnhancedResult;

/// Stamps the configured attributes with the current time on every write.
#[derive(Debug, Clone)]
pub struct AutoGeneratedTimestampExtension {
    attributes: Vec<String>,
    clock: fn() -> DateTime<Utc>,
}

impl AutoGeneratedTimestampExtension {
    /// Stamp `attributes` with `Utc::now()`.
    #[must_use]
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            clock: Utc::now,
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

impl Extension for AutoGeneratedTimestampExtension {
    fn before_write(&self, context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
        if self.attributes.is_empty() {
            return Ok(WriteModification::default());
        }
        let now = AttributeValue::S(DateTimeConverter::format(&(self.clock)()));
        let mut item = context.item.clone();
        for attribute in &self.attributes {
            item.insert(attribute.clone(), now.clone());
        }
        Ok(WriteModification {
            transformed_item: Some(item),
            ..WriteModification::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use dynamap_model::Item;

    use super::*;
    use crate::extension::tests::context;
    use crate::operation::OperationName;
    use crate::schema::tests::order_schema;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_should_stamp_configured_attributes() {
        let schema = order_schema();
        let ctx = context();
        let item = Item::from([("updated_at".to_owned(), AttributeValue::from("old"))]);
        let m = AutoGeneratedTimestampExtension::new(["updated_at", "touched_at"])
            .with_clock(fixed)
            .before_write(&BeforeWriteContext {
                item: &item,
                table_metadata: schema.table_metadata(),
                operation: OperationName::UpdateItem,
                operation_context: &ctx,
            })
            .expect("write");
        let out = m.transformed_item.expect("item");
        assert_eq!(out.get("updated_at"), Some(&AttributeValue::from("2024-01-01T10:00:00Z")));
        assert_eq!(out.get("touched_at"), Some(&AttributeValue::from("2024-01-01T10:00:00Z")));
        assert!(m.additional_condition.is_none());
    }
}
