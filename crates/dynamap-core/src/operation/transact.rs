//! `TransactWriteItems` and `TransactGetItems`.
//!
//! Every sub-request is composed by the matching single-item translator, so
//! extensions, key checks and expression merging behave exactly as they do
//! outside a transaction. A cancellation comes back as one
//! [`CancellationDetail`](crate::error::CancellationDetail) per sub-request,
//! tagged with its position and table.

use dynamap_model::Item;
use dynamap_model::input::{TransactGetItemsInput, TransactWriteItemsInput};
use dynamap_model::output::{TransactGetItemsOutput, TransactWriteItemsOutput};
use dynamap_model::types::{
    ConditionCheck, Delete, Get, Put, TransactGetItem, TransactWriteItem, Update,
};

use super::delete::{DeleteItemOperation, DeleteItemRequest};
use super::put::{PutItemOperation, PutItemRequest};
use super::update::{UpdateItemOperation, UpdateItemRequest};
use super::{
    ComposedExpressions, DatabaseOperation, OperationName, TableOperation, merge_conditions,
    read_optional_record,
};
use crate::client::{WireClient, WireFuture};
use crate::config::EnhancedConfig;
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::Expression;
use crate::key::Key;
use crate::schema::PRIMARY_INDEX;
use crate::table::MappedTable;

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Ordered sub-requests of an atomic write.
///
/// # Examples
///
/// ```no_run
/// # use dynamap_core::operation::transact::TransactWriteItemsRequest;
/// # use dynamap_core::table::MappedTable;
/// # use dynamap_core::error::EnhancedResult;
/// # fn demo<T: Default>(table: &MappedTable<T>, a: T, b: T) -> EnhancedResult<()> {
/// let request = TransactWriteItemsRequest::new()
///     .add_put_item(table, a)?
///     .add_update_item(table, b)?;
/// assert_eq!(request.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactWriteItemsRequest {
    items: Vec<TransactWriteItem>,
    table_names: Vec<String>,
    client_request_token: Option<String>,
}

impl TransactWriteItemsRequest {
    /// An empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sub-requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no sub-requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Idempotency token.
    #[must_use]
    pub fn client_request_token(mut self, token: impl Into<String>) -> Self {
        self.client_request_token = Some(token.into());
        self
    }

    /// Put `record`.
    pub fn add_put_item<T: Default>(self, table: &MappedTable<T>, record: T) -> EnhancedResult<Self> {
        self.add_put_item_with(table, PutItemRequest::builder().item(record).build())
    }

    /// Put with a caller condition.
    pub fn add_put_item_with<T: Default>(self, table: &MappedTable<T>, request: PutItemRequest<T>) -> EnhancedResult<Self> {
        let input = PutItemOperation::new(request).generate_request(table.schema(), &table.context(), table.extension())?;
        let put = Put {
            table_name: input.table_name,
            item: input.item,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values_on_condition_check_failure: None,
        };
        Ok(self.push(TransactWriteItem {
            put: Some(put),
            ..TransactWriteItem::default()
        }))
    }

    /// Update from `record`, removing the attributes it leaves absent.
    pub fn add_update_item<T: Default>(self, table: &MappedTable<T>, record: T) -> EnhancedResult<Self> {
        self.add_update_item_with(table, UpdateItemRequest::builder().item(record).build())
    }

    /// Update with explicit options. Return values do not apply inside a
    /// transaction and are ignored.
    pub fn add_update_item_with<T: Default>(
        self,
        table: &MappedTable<T>,
        request: UpdateItemRequest<T>,
    ) -> EnhancedResult<Self> {
        let input =
            UpdateItemOperation::new(request).generate_request(table.schema(), &table.context(), table.extension())?;
        let update_expression = input.update_expression.ok_or_else(|| {
            EnhancedError::validation(format!(
                "transactional update on table '{}' has nothing to write",
                input.table_name
            ))
        })?;
        let update = Update {
            table_name: input.table_name,
            key: input.key,
            update_expression,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values_on_condition_check_failure: None,
        };
        Ok(self.push(TransactWriteItem {
            update: Some(update),
            ..TransactWriteItem::default()
        }))
    }

    /// Delete by key.
    pub fn add_delete_item<T: Default>(self, table: &MappedTable<T>, key: Key) -> EnhancedResult<Self> {
        self.add_delete_item_with(table, DeleteItemRequest::builder().key(key).build())
    }

    /// Delete the item `record` maps to, optionally guarded by its version.
    pub fn add_delete_record<T: Default>(
        self,
        table: &MappedTable<T>,
        record: &T,
        optimistic_locking: bool,
    ) -> EnhancedResult<Self> {
        let request = DeleteItemRequest::for_record(table.schema(), record, optimistic_locking)?;
        self.add_delete_item_with(table, request)
    }

    /// Delete with a caller condition.
    pub fn add_delete_item_with<T: Default>(self, table: &MappedTable<T>, request: DeleteItemRequest) -> EnhancedResult<Self> {
        let input = DeleteItemOperation::<T>::new(request).generate_request(
            table.schema(),
            &table.context(),
            table.extension(),
        )?;
        let delete = Delete {
            table_name: input.table_name,
            key: input.key,
            condition_expression: input.condition_expression,
            expression_attribute_names: input.expression_attribute_names,
            expression_attribute_values: input.expression_attribute_values,
            return_values_on_condition_check_failure: None,
        };
        Ok(self.push(TransactWriteItem {
            delete: Some(delete),
            ..TransactWriteItem::default()
        }))
    }

    /// Require `condition` to hold on the item with `key` without writing it.
    pub fn add_condition_check<T>(self, table: &MappedTable<T>, key: &Key, condition: &Expression) -> EnhancedResult<Self> {
        let key = key.key_map(table.schema().table_metadata(), PRIMARY_INDEX)?;
        let composed = ComposedExpressions::compose(merge_conditions(None, Some(condition))?, None)?;
        let check = ConditionCheck {
            table_name: table.table_name().to_owned(),
            key,
            condition_expression: composed.condition.unwrap_or_default(),
            expression_attribute_names: composed.names,
            expression_attribute_values: composed.values,
            return_values_on_condition_check_failure: None,
        };
        Ok(self.push(TransactWriteItem {
            condition_check: Some(check),
            ..TransactWriteItem::default()
        }))
    }

    fn push(mut self, item: TransactWriteItem) -> Self {
        self.table_names.push(item.table_name().unwrap_or_default().to_owned());
        self.items.push(item);
        self
    }
}

/// Translator for [`TransactWriteItemsRequest`].
#[derive(Debug)]
pub struct TransactWriteItemsOperation {
    request: TransactWriteItemsRequest,
}

impl TransactWriteItemsOperation {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: TransactWriteItemsRequest) -> Self {
        Self { request }
    }
}

impl DatabaseOperation for TransactWriteItemsOperation {
    type Request = TransactWriteItemsInput;
    type Response = TransactWriteItemsOutput;
    type Output = ();

    fn operation_name(&self) -> OperationName {
        OperationName::TransactWriteItems
    }

    fn generate_request(&self, config: &EnhancedConfig) -> EnhancedResult<TransactWriteItemsInput> {
        check_transaction_size(self.operation_name(), self.request.len(), config.max_transact_items)?;
        Ok(TransactWriteItemsInput {
            transact_items: self.request.items.clone(),
            client_request_token: self.request.client_request_token.clone(),
            ..TransactWriteItemsInput::default()
        })
    }

    fn service_call(
        &self,
        client: &dyn WireClient,
        request: TransactWriteItemsInput,
    ) -> WireFuture<TransactWriteItemsOutput> {
        client.transact_write_items(request)
    }

    fn transform_response(&self, _response: TransactWriteItemsOutput) -> EnhancedResult<()> {
        Ok(())
    }

    fn transform_error(&self, error: EnhancedError) -> EnhancedError {
        attach_table_names(error, &self.request.table_names)
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Ordered reads of an atomic get.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactGetItemsRequest {
    items: Vec<TransactGetItem>,
}

impl TransactGetItemsRequest {
    /// An empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the item with `key` from `table`.
    pub fn add_get_item<T>(mut self, table: &MappedTable<T>, key: &Key) -> EnhancedResult<Self> {
        let key = key.key_map(table.schema().table_metadata(), PRIMARY_INDEX)?;
        self.items.push(TransactGetItem {
            get: Get {
                table_name: table.table_name().to_owned(),
                key,
                ..Get::default()
            },
        });
        Ok(self)
    }

    /// Number of reads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no reads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One result of a transactional get, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    table_name: String,
    item: Option<Item>,
}

impl Document {
    /// Table the item was read from.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Raw item, if one was found.
    #[must_use]
    pub fn raw_item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    /// Hydrate the item with `table`'s schema and extension.
    pub fn item<T: Default>(&self, table: &MappedTable<T>) -> EnhancedResult<Option<T>> {
        if table.table_name() != self.table_name {
            return Err(EnhancedError::validation(format!(
                "document was read from table '{}', not '{}'",
                self.table_name,
                table.table_name()
            )));
        }
        read_optional_record(table.schema(), table.extension(), &table.context(), self.item.clone())
    }
}

/// Translator for [`TransactGetItemsRequest`].
#[derive(Debug)]
pub struct TransactGetItemsOperation {
    request: TransactGetItemsRequest,
}

impl TransactGetItemsOperation {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: TransactGetItemsRequest) -> Self {
        Self { request }
    }

    fn table_names(&self) -> Vec<String> {
        self.request.items.iter().map(|i| i.get.table_name.clone()).collect()
    }
}

impl DatabaseOperation for TransactGetItemsOperation {
    type Request = TransactGetItemsInput;
    type Response = TransactGetItemsOutput;
    type Output = Vec<Document>;

    fn operation_name(&self) -> OperationName {
        OperationName::TransactGetItems
    }

    fn generate_request(&self, config: &EnhancedConfig) -> EnhancedResult<TransactGetItemsInput> {
        check_transaction_size(self.operation_name(), self.request.len(), config.max_transact_items)?;
        Ok(TransactGetItemsInput {
            transact_items: self.request.items.clone(),
            ..TransactGetItemsInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: TransactGetItemsInput) -> WireFuture<TransactGetItemsOutput> {
        client.transact_get_items(request)
    }

    fn transform_response(&self, response: TransactGetItemsOutput) -> EnhancedResult<Vec<Document>> {
        if response.responses.len() != self.request.len() {
            return Err(EnhancedError::Extension(anyhow::anyhow!(
                "store returned {} responses for {} reads",
                response.responses.len(),
                self.request.len()
            )));
        }
        Ok(self
            .request
            .items
            .iter()
            .zip(response.responses)
            .map(|(request, response)| Document {
                table_name: request.get.table_name.clone(),
                item: response.item,
            })
            .collect())
    }

    fn transform_error(&self, error: EnhancedError) -> EnhancedError {
        attach_table_names(error, &self.table_names())
    }
}

fn check_transaction_size(operation: OperationName, count: usize, limit: usize) -> EnhancedResult<()> {
    if count == 0 {
        return Err(EnhancedError::validation(format!("{operation} needs at least one item")));
    }
    if count > limit {
        return Err(EnhancedError::validation(format!(
            "{operation} holds {count} items, more than the limit of {limit}"
        )));
    }
    Ok(())
}

fn attach_table_names(error: EnhancedError, table_names: &[String]) -> EnhancedError {
    match error {
        EnhancedError::TransactionCanceled(cancellation) => {
            let cancellation = cancellation.with_table_names(table_names);
            for failure in cancellation.failures() {
                tracing::warn!(
                    index = failure.index,
                    table = failure.table_name.as_deref().unwrap_or_default(),
                    code = %failure.code,
                    "transaction sub-request failed"
                );
            }
            EnhancedError::TransactionCanceled(cancellation)
        }
        other => other,
    }
}
