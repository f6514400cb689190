//! `PutItem`.

use dynamap_model::input::PutItemInput;
use dynamap_model::output::PutItemOutput;
use dynamap_model::types::ReturnValue;
use typed_builder::TypedBuilder;

use super::{
    ComposedExpressions, OperationContext, OperationName, TableOperation, merge_conditions,
    read_optional_record,
};
use crate::client::{WireClient, WireFuture};
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::Expression;
use crate::extension::{Extension, run_before_write};
use crate::key::Key;
use crate::schema::{PRIMARY_INDEX, TableSchema};

/// Item image a put or delete hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutReturnValues {
    /// Nothing.
    #[default]
    None,
    /// The item as it was before the write.
    AllOld,
}

impl PutReturnValues {
    pub(crate) fn wire(self) -> Option<ReturnValue> {
        match self {
            Self::None => None,
            Self::AllOld => Some(ReturnValue::AllOld),
        }
    }
}

/// Write a whole record, replacing any stored item with the same key.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PutItemRequest<T> {
    /// Record to write.
    pub item: T,
    /// Caller condition, AND-ed after any extension condition.
    #[builder(default, setter(strip_option))]
    pub condition_expression: Option<Expression>,
    /// Image to return.
    #[builder(default)]
    pub return_values: PutReturnValues,
}

/// Translator for [`PutItemRequest`].
#[derive(Debug)]
pub struct PutItemOperation<T> {
    request: PutItemRequest<T>,
}

impl<T> PutItemOperation<T> {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: PutItemRequest<T>) -> Self {
        Self { request }
    }
}

impl<T: Default> TableOperation<T> for PutItemOperation<T> {
    type Request = PutItemInput;
    type Response = PutItemOutput;
    type Output = Option<T>;

    fn operation_name(&self) -> OperationName {
        OperationName::PutItem
    }

    fn generate_request(
        &self,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<PutItemInput> {
        let operation = self.operation_name();
        context.require_primary_index(operation)?;
        let metadata = schema.table_metadata();

        let item = schema.item_from(&self.request.item, true)?;
        let (item, modification) = run_before_write(extension, item, metadata, operation, context)?;
        if modification.update_expression.is_some() {
            return Err(EnhancedError::validation(
                "an extension produced an update expression, which PutItem cannot apply",
            ));
        }
        Key::from_item(&item, metadata, PRIMARY_INDEX)?;

        let condition = merge_conditions(
            modification.additional_condition,
            self.request.condition_expression.as_ref(),
        )?;
        let composed = ComposedExpressions::compose(condition, None)?;
        Ok(PutItemInput {
            table_name: context.table_name().to_owned(),
            item,
            condition_expression: composed.condition,
            expression_attribute_names: composed.names,
            expression_attribute_values: composed.values,
            return_values: self.request.return_values.wire(),
            ..PutItemInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: PutItemInput) -> WireFuture<PutItemOutput> {
        client.put_item(request)
    }

    fn transform_response(
        &self,
        response: PutItemOutput,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<Option<T>> {
        read_optional_record(schema, extension, context, Some(response.attributes))
    }
}

#[cfg(test)]
mod tests {
    use dynamap_model::AttributeValue;

    use super::*;
    use crate::expression::{SetAction, UpdateAction, UpdateExpression};
    use crate::extension::{BeforeWriteContext, VersionedRecordExtension, WriteModification};
    use crate::schema::tests::{Order, order_schema, sample_order};

    fn generate(
        request: PutItemRequest<Order>,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<PutItemInput> {
        PutItemOperation::new(request).generate_request(&order_schema(), &OperationContext::new("orders"), extension)
    }

    #[test]
    fn test_should_put_versioned_record_with_guard() {
        let input = generate(
            PutItemRequest::builder().item(sample_order()).build(),
            Some(&VersionedRecordExtension::default()),
        )
        .expect("request");
        assert_eq!(input.item.get("version"), Some(&AttributeValue::number(1)));
        assert!(!input.item.contains_key("note"));
        assert_eq!(
            input.condition_expression.as_deref(),
            Some("attribute_not_exists(#AMZN_MAPPED_version)")
        );
        assert!(input.return_values.is_none());
    }

    #[test]
    fn test_should_and_extension_and_caller_conditions() {
        let caller = Expression::builder()
            .expression("#s <> :closed")
            .put_name("#s", "status")
            .put_value(":closed", AttributeValue::from("CLOSED"))
            .build();
        let mut order = sample_order();
        order.version = Some(4);
        let input = generate(
            PutItemRequest::builder()
                .item(order)
                .condition_expression(caller)
                .return_values(PutReturnValues::AllOld)
                .build(),
            Some(&VersionedRecordExtension::default()),
        )
        .expect("request");
        assert_eq!(
            input.condition_expression.as_deref(),
            Some("(#AMZN_MAPPED_version = :old_version_value) AND (#s <> :closed)")
        );
        assert_eq!(input.expression_attribute_names.len(), 2);
        assert_eq!(input.expression_attribute_values.len(), 2);
        assert_eq!(input.return_values, Some(ReturnValue::AllOld));
    }

    #[derive(Debug)]
    struct Updater;

    impl Extension for Updater {
        fn before_write(&self, _context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
            Ok(WriteModification {
                update_expression: Some(UpdateExpression::new().with_action(UpdateAction::Set(
                    SetAction::for_attribute("x", AttributeValue::from("y")),
                ))),
                ..WriteModification::default()
            })
        }
    }

    #[test]
    fn test_should_reject_extension_update_expression() {
        let err = generate(PutItemRequest::builder().item(sample_order()).build(), Some(&Updater))
            .expect_err("rejected");
        assert!(matches!(err, EnhancedError::Validation(_)));
    }

    #[test]
    fn test_should_reject_record_without_key() {
        let mut order = sample_order();
        order.order_id = None;
        let err = generate(PutItemRequest::builder().item(order).build(), None).expect_err("missing key");
        assert!(matches!(err, EnhancedError::MissingKeyAttribute { ref attribute, .. } if attribute == "order_id"));
    }

    #[test]
    fn test_should_reject_index_scoped_put() {
        let err = PutItemOperation::new(PutItemRequest::builder().item(sample_order()).build())
            .generate_request(
                &order_schema(),
                &OperationContext::with_index("orders", "by_status"),
                None,
            )
            .expect_err("index");
        assert!(matches!(err, EnhancedError::Validation(_)));
    }
}
