//! `UpdateItem`.

use dynamap_model::input::UpdateItemInput;
use dynamap_model::output::UpdateItemOutput;
use dynamap_model::types::ReturnValue;
use typed_builder::TypedBuilder;

use super::{
    ComposedExpressions, OperationContext, OperationName, TableOperation, merge_conditions,
    read_optional_record,
};
use crate::client::{WireClient, WireFuture};
use crate::error::EnhancedResult;
use crate::expression::{Expression, UpdateExpression, UpdateExpressionResolver};
use crate::extension::{Extension, run_before_write};
use crate::key::Key;
use crate::schema::{PRIMARY_INDEX, TableSchema};

/// Write the non-key attributes of a record onto the stored item.
///
/// With `ignore_nulls` unset, absent record attributes are removed from the
/// stored item. With it set, they are left untouched.
#[derive(Debug, Clone, TypedBuilder)]
pub struct UpdateItemRequest<T> {
    /// Record carrying the key and the attributes to write.
    pub item: T,
    /// Leave absent attributes alone instead of removing them.
    #[builder(default)]
    pub ignore_nulls: bool,
    /// Caller condition, AND-ed after any extension condition.
    #[builder(default, setter(strip_option))]
    pub condition_expression: Option<Expression>,
    /// Extra caller actions merged with the record's.
    #[builder(default, setter(strip_option))]
    pub update_expression: Option<UpdateExpression>,
    /// Image to return.
    #[builder(default = ReturnValue::AllNew)]
    pub return_values: ReturnValue,
}

/// Translator for [`UpdateItemRequest`].
#[derive(Debug)]
pub struct UpdateItemOperation<T> {
    request: UpdateItemRequest<T>,
}

impl<T> UpdateItemOperation<T> {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: UpdateItemRequest<T>) -> Self {
        Self { request }
    }
}

impl<T: Default> TableOperation<T> for UpdateItemOperation<T> {
    type Request = UpdateItemInput;
    type Response = UpdateItemOutput;
    type Output = Option<T>;

    fn operation_name(&self) -> OperationName {
        OperationName::UpdateItem
    }

    fn generate_request(
        &self,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<UpdateItemInput> {
        let operation = self.operation_name();
        context.require_primary_index(operation)?;
        let metadata = schema.table_metadata();

        let item = schema.item_from(&self.request.item, self.request.ignore_nulls)?;
        let (item, modification) = run_before_write(extension, item, metadata, operation, context)?;
        let key = Key::from_item(&item, metadata, PRIMARY_INDEX)?.key_map(metadata, PRIMARY_INDEX)?;

        if let Some(request) = &self.request.update_expression {
            request.validate()?;
        }
        let update_behaviors = schema.update_behaviors();
        let key_attributes = metadata.key_attributes();
        let update = UpdateExpressionResolver {
            item: &item,
            key_attributes: &key_attributes,
            extension: modification.update_expression.as_ref(),
            request: self.request.update_expression.as_ref(),
            update_behaviors: &update_behaviors,
        }
        .resolve()?;
        let update = match update {
            Some(update) => update.to_expression()?,
            None => None,
        };

        let condition = merge_conditions(
            modification.additional_condition,
            self.request.condition_expression.as_ref(),
        )?;
        let composed = ComposedExpressions::compose(condition, update)?;
        tracing::debug!(
            table = %context.table_name(),
            update = composed.update.as_deref().unwrap_or_default(),
            "composed update"
        );
        Ok(UpdateItemInput {
            table_name: context.table_name().to_owned(),
            key,
            update_expression: composed.update,
            condition_expression: composed.condition,
            expression_attribute_names: composed.names,
            expression_attribute_values: composed.values,
            return_values: Some(self.request.return_values),
            ..UpdateItemInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: UpdateItemInput) -> WireFuture<UpdateItemOutput> {
        client.update_item(request)
    }

    fn transform_response(
        &self,
        response: UpdateItemOutput,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<Option<T>> {
        read_optional_record(schema, extension, context, Some(response.attributes))
    }
}
