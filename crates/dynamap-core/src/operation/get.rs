//! `GetItem`.

use std::marker::PhantomData;

use dynamap_model::input::GetItemInput;
use dynamap_model::output::GetItemOutput;
use typed_builder::TypedBuilder;

use super::{OperationContext, OperationName, TableOperation, read_optional_record};
use crate::client::{WireClient, WireFuture};
use crate::error::EnhancedResult;
use crate::extension::Extension;
use crate::key::Key;
use crate::schema::{PRIMARY_INDEX, TableSchema};

/// Read one record by primary key.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct GetItemRequest {
    /// Primary key.
    pub key: Key,
    /// Strongly consistent read. `None` uses the client default.
    #[builder(default, setter(strip_option))]
    pub consistent_read: Option<bool>,
}

/// Translator for [`GetItemRequest`].
#[derive(Debug)]
pub struct GetItemOperation<T> {
    request: GetItemRequest,
    record: PhantomData<fn() -> T>,
}

impl<T> GetItemOperation<T> {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: GetItemRequest) -> Self {
        Self {
            request,
            record: PhantomData,
        }
    }
}

impl<T: Default> TableOperation<T> for GetItemOperation<T> {
    type Request = GetItemInput;
    type Response = GetItemOutput;
    type Output = Option<T>;

    fn operation_name(&self) -> OperationName {
        OperationName::GetItem
    }

    fn generate_request(
        &self,
        schema: &TableSchema<T>,
        context: &OperationContext,
        _extension: Option<&dyn Extension>,
    ) -> EnhancedResult<GetItemInput> {
        context.require_primary_index(self.operation_name())?;
        Ok(GetItemInput {
            table_name: context.table_name().to_owned(),
            key: self.request.key.key_map(schema.table_metadata(), PRIMARY_INDEX)?,
            consistent_read: self.request.consistent_read,
            ..GetItemInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: GetItemInput) -> WireFuture<GetItemOutput> {
        client.get_item(request)
    }

    fn transform_response(
        &self,
        response: GetItemOutput,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<Option<T>> {
        read_optional_record(schema, extension, context, response.item)
    }
}

#[cfg(test)]
mod tests {
    use dynamap_model::AttributeValue;

    use super::*;
    use crate::schema::tests::{Order, order_schema};

    fn key() -> Key {
        Key::builder()
            .partition_value(AttributeValue::from("c1"))
            .sort_value(AttributeValue::from("o1"))
            .build()
    }

    #[test]
    fn test_should_build_get_request() {
        let schema = order_schema();
        let op = GetItemOperation::<Order>::new(GetItemRequest::builder().key(key()).consistent_read(true).build());
        let input = op
            .generate_request(&schema, &OperationContext::new("orders"), None)
            .expect("request");
        assert_eq!(input.table_name, "orders");
        assert_eq!(input.key.len(), 2);
        assert_eq!(input.consistent_read, Some(true));
    }

    #[test]
    fn test_should_map_missing_item_to_none() {
        let schema = order_schema();
        let op = GetItemOperation::<Order>::new(GetItemRequest::builder().key(key()).build());
        let out = op
            .transform_response(GetItemOutput::default(), &schema, &OperationContext::new("orders"), None)
            .expect("response");
        assert!(out.is_none());
    }

    #[test]
    fn test_should_reject_missing_sort_value() {
        let schema = order_schema();
        let partial = Key::builder().partition_value(AttributeValue::from("c1")).build();
        let op = GetItemOperation::<Order>::new(GetItemRequest::builder().key(partial).build());
        assert!(
            op.generate_request(&schema, &OperationContext::new("orders"), None)
                .is_err()
        );
    }
}
