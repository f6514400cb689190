//! Server-side counters.

use std::collections::HashMap;

use dynamap_model::AttributeValue;

use super::{BeforeWriteContext, Extension, WriteModification};
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{SetAction, UpdateAction, UpdateExpression, key_ref, value_ref};
use crate::operation::OperationName;

/// One counter attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicCounter {
    /// Attribute holding the counter.
    pub attribute: String,
    /// Value of the counter after the first write.
    pub start: i64,
    /// Increment applied by every update.
    pub delta: i64,
}

impl AtomicCounter {
    /// Counter starting at 0 and counting by 1.
    #[must_use]
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            start: 0,
            delta: 1,
        }
    }

    /// Set the start value.
    #[must_use]
    pub fn start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Set the increment.
    #[must_use]
    pub fn delta(mut self, delta: i64) -> Self {
        self.delta = delta;
        self
    }

    /// `SET #c = if_not_exists(#c, :c_Start) + :c_Delta`, with the seed chosen
    /// so that the first update lands on `start`. Fails when that seed does
    /// not fit in an `i64`.
    pub fn increment_action(&self) -> EnhancedResult<SetAction> {
        let seed = self.start.checked_sub(self.delta).ok_or_else(|| {
            EnhancedError::Extension(anyhow::anyhow!(
                "counter attribute '{}' cannot start at {} with delta {}",
                self.attribute,
                self.start,
                self.delta
            ))
        })?;
        let path = key_ref(&self.attribute);
        let base = value_ref(&self.attribute);
        let start_token = format!("{base}_Start");
        let delta_token = format!("{base}_Delta");
        Ok(SetAction {
            value: format!("if_not_exists({path}, {start_token}) + {delta_token}"),
            expression_names: HashMap::from([(path.clone(), self.attribute.clone())]),
            expression_values: HashMap::from([
                (start_token, AttributeValue::number(seed)),
                (delta_token, AttributeValue::number(self.delta)),
            ]),
            path,
        })
    }
}

/// Maintains counters: updates increment them on the server, puts reset them
/// to their start value. Record values of counter attributes are ignored.
#[derive(Debug, Clone, Default)]
pub struct AtomicCounterExtension {
    counters: Vec<AtomicCounter>,
}

impl AtomicCounterExtension {
    /// Manage `counters`.
    #[must_use]
    pub fn new(counters: Vec<AtomicCounter>) -> Self {
        Self { counters }
    }
}

impl Extension for AtomicCounterExtension {
    fn before_write(&self, context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
        if self.counters.is_empty() {
            return Ok(WriteModification::default());
        }

        let mut item = context.item.clone();
        if context.operation == OperationName::UpdateItem {
            let mut update = UpdateExpression::new();
            for counter in &self.counters {
                item.remove(&counter.attribute);
                update.add_action(UpdateAction::Set(counter.increment_action()?));
            }
            return Ok(WriteModification {
                transformed_item: Some(item),
                additional_condition: None,
                update_expression: Some(update),
            });
        }

        for counter in &self.counters {
            item.insert(counter.attribute.clone(), AttributeValue::number(counter.start));
        }
        Ok(WriteModification {
            transformed_item: Some(item),
            ..WriteModification::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use dynamap_model::Item;

    use super::*;
    use crate::extension::tests::context;
    use crate::schema::tests::order_schema;

    fn run(operation: OperationName, item: &Item) -> WriteModification {
        let schema = order_schema();
        let ctx = context();
        AtomicCounterExtension::new(vec![AtomicCounter::new("views").start(10).delta(5)])
            .before_write(&BeforeWriteContext {
                item,
                table_metadata: schema.table_metadata(),
                operation,
                operation_context: &ctx,
            })
            .expect("write")
    }

    #[test]
    fn test_should_emit_increment_on_update() {
        let item = Item::from([("views".to_owned(), AttributeValue::null())]);
        let m = run(OperationName::UpdateItem, &item);
        assert!(!m.transformed_item.expect("item").contains_key("views"));
        let expr = m
            .update_expression
            .expect("update")
            .to_expression()
            .expect("render")
            .expect("some");
        assert_eq!(
            expr.expression(),
            "SET #AMZN_MAPPED_views = if_not_exists(#AMZN_MAPPED_views, :AMZN_MAPPED_views_Start) + :AMZN_MAPPED_views_Delta"
        );
        assert_eq!(expr.values().get(":AMZN_MAPPED_views_Start"), Some(&AttributeValue::number(5)));
        assert_eq!(expr.values().get(":AMZN_MAPPED_views_Delta"), Some(&AttributeValue::number(5)));
    }

    #[test]
    fn test_should_seed_start_value_on_put() {
        let item = Item::from([("views".to_owned(), AttributeValue::number(99))]);
        let m = run(OperationName::PutItem, &item);
        assert!(m.update_expression.is_none());
        assert_eq!(
            m.transformed_item.expect("item").get("views"),
            Some(&AttributeValue::number(10))
        );
    }

    #[test]
    fn test_should_reject_counter_seed_overflow() {
        let err = AtomicCounter::new("views")
            .start(i64::MIN)
            .delta(1)
            .increment_action()
            .expect_err("overflow");
        assert!(matches!(err, EnhancedError::Extension(_)));

        let schema = order_schema();
        let ctx = context();
        let err = AtomicCounterExtension::new(vec![AtomicCounter::new("views").start(i64::MAX).delta(-1)])
            .before_write(&BeforeWriteContext {
                item: &Item::new(),
                table_metadata: schema.table_metadata(),
                operation: OperationName::UpdateItem,
                operation_context: &ctx,
            })
            .expect_err("overflow");
        assert!(matches!(err, EnhancedError::Extension(_)));
    }
}
