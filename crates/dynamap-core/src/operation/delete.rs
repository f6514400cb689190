//! `DeleteItem`.

use std::marker::PhantomData;

use dynamap_model::input::DeleteItemInput;
use dynamap_model::output::DeleteItemOutput;
use typed_builder::TypedBuilder;

use super::put::PutReturnValues;
use super::{
    ComposedExpressions, OperationContext, OperationName, TableOperation, merge_conditions,
    read_optional_record,
};
use crate::client::{WireClient, WireFuture};
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{Expression, key_ref};
use crate::extension::{Extension, OLD_VERSION_VALUE, run_before_write};
use crate::key::Key;
use crate::schema::{PRIMARY_INDEX, TableSchema};

/// Return-value modes of a delete (same choices as a put).
pub type DeleteReturnValues = PutReturnValues;

/// Delete one item by primary key.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct DeleteItemRequest {
    /// Primary key.
    pub key: Key,
    /// Caller condition, AND-ed after any extension condition.
    #[builder(default, setter(strip_option))]
    pub condition_expression: Option<Expression>,
    /// Image to return. Defaults to the deleted item.
    #[builder(default = PutReturnValues::AllOld)]
    pub return_values: DeleteReturnValues,
}

impl DeleteItemRequest {
    /// Delete `record`, optionally guarded by the version it carries.
    ///
    /// With `optimistic_locking` set, a schema with a version attribute and a
    /// record holding a version, the delete only succeeds if the stored
    /// version still matches.
    pub fn for_record<T>(schema: &TableSchema<T>, record: &T, optimistic_locking: bool) -> EnhancedResult<Self> {
        let key = schema.key_for(record, PRIMARY_INDEX)?;
        let condition = if optimistic_locking {
            optimistic_locking_condition(schema, record)?
        } else {
            None
        };
        Ok(Self {
            key,
            condition_expression: condition,
            return_values: PutReturnValues::AllOld,
        })
    }
}

/// `#AMZN_MAPPED_<version> = :old_version_value` for a record that carries a
/// version, `None` otherwise.
pub fn optimistic_locking_condition<T>(schema: &TableSchema<T>, record: &T) -> EnhancedResult<Option<Expression>> {
    let Some(attribute) = schema.table_metadata().version_attribute() else {
        return Ok(None);
    };
    let Some(version) = schema.attribute_value(record, attribute)? else {
        return Ok(None);
    };
    let token = key_ref(attribute);
    Ok(Some(
        Expression::builder()
            .expression(format!("{token} = {OLD_VERSION_VALUE}"))
            .put_name(token, attribute)
            .put_value(OLD_VERSION_VALUE, version)
            .build(),
    ))
}

/// Translator for [`DeleteItemRequest`].
#[derive(Debug)]
pub struct DeleteItemOperation<T> {
    request: DeleteItemRequest,
    record: PhantomData<fn() -> T>,
}

impl<T> DeleteItemOperation<T> {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: DeleteItemRequest) -> Self {
        Self {
            request,
            record: PhantomData,
        }
    }
}

impl<T: Default> TableOperation<T> for DeleteItemOperation<T> {
    type Request = DeleteItemInput;
    type Response = DeleteItemOutput;
    type Output = Option<T>;

    fn operation_name(&self) -> OperationName {
        OperationName::DeleteItem
    }

    fn generate_request(
        &self,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<DeleteItemInput> {
        let operation = self.operation_name();
        context.require_primary_index(operation)?;
        let metadata = schema.table_metadata();
        let key = self.request.key.key_map(metadata, PRIMARY_INDEX)?;

        // Extensions see the key but cannot rewrite it.
        let (_, modification) = run_before_write(extension, key.clone(), metadata, operation, context)?;
        if modification.update_expression.is_some() {
            return Err(EnhancedError::validation(
                "an extension produced an update expression, which DeleteItem cannot apply",
            ));
        }

        let condition = merge_conditions(
            modification.additional_condition,
            self.request.condition_expression.as_ref(),
        )?;
        let composed = ComposedExpressions::compose(condition, None)?;
        Ok(DeleteItemInput {
            table_name: context.table_name().to_owned(),
            key,
            condition_expression: composed.condition,
            expression_attribute_names: composed.names,
            expression_attribute_values: composed.values,
            return_values: self.request.return_values.wire(),
            ..DeleteItemInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: DeleteItemInput) -> WireFuture<DeleteItemOutput> {
        client.delete_item(request)
    }

    fn transform_response(
        &self,
        response: DeleteItemOutput,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<Option<T>> {
        read_optional_record(schema, extension, context, Some(response.attributes))
    }
}
