//! Operation translators.
//!
//! Each translator turns a typed request into exactly one wire request and
//! the wire response back into records. A call moves through
//!
//! ```text
//! Received -> ItemBuilt -> KeyExtracted -> ExpressionsComposed -> Dispatched
//!          -> Applied | ConditionFailed | TransportError
//! ```
//!
//! Everything up to `ExpressionsComposed` happens in
//! [`TableOperation::generate_request`], synchronously. A failure there is a
//! composition error and nothing is sent.

pub mod batch;
pub mod delete;
pub mod get;
pub mod put;
pub mod transact;
pub mod update;

use std::collections::HashMap;

use dynamap_model::{AttributeValue, DynamoDBError, Item};

pub use dynamap_model::DynamoDBOperation as OperationName;

use crate::client::{WireClient, WireFuture};
use crate::config::EnhancedConfig;
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{AND, Expression};
use crate::extension::{Extension, run_after_read};
use crate::schema::{PRIMARY_INDEX, TableSchema};

/// Table and index an operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    table_name: String,
    index_name: String,
}

impl OperationContext {
    /// Target the primary index of `table_name`.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self::with_index(table_name, PRIMARY_INDEX)
    }

    /// Target a named index.
    #[must_use]
    pub fn with_index(table_name: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            index_name: index_name.into(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Index name ([`PRIMARY_INDEX`] for the table itself).
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Returns `true` when targeting the table's primary index.
    #[must_use]
    pub fn is_primary_index(&self) -> bool {
        self.index_name == PRIMARY_INDEX
    }

    pub(crate) fn require_primary_index(&self, operation: OperationName) -> EnhancedResult<()> {
        if self.is_primary_index() {
            return Ok(());
        }
        Err(EnhancedError::validation(format!(
            "{operation} cannot be executed against secondary index '{}'",
            self.index_name
        )))
    }
}

/// A single-table operation on records of type `T`.
pub trait TableOperation<T> {
    /// Wire request.
    type Request;
    /// Wire response.
    type Response;
    /// What the caller gets back.
    type Output;

    /// Wire operation name.
    fn operation_name(&self) -> OperationName;

    /// Build the record item, run extensions, derive the key and compose
    /// expressions.
    fn generate_request(
        &self,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<Self::Request>;

    /// Send the request.
    fn service_call(&self, client: &dyn WireClient, request: Self::Request) -> WireFuture<Self::Response>;

    /// Turn the wire response into the caller's output.
    fn transform_response(
        &self,
        response: Self::Response,
        schema: &TableSchema<T>,
        context: &OperationContext,
        extension: Option<&dyn Extension>,
    ) -> EnhancedResult<Self::Output>;
}

/// An operation spanning several tables (batches and transactions).
pub trait DatabaseOperation {
    /// Wire request.
    type Request;
    /// Wire response.
    type Response;
    /// What the caller gets back.
    type Output;

    /// Wire operation name.
    fn operation_name(&self) -> OperationName;

    /// Compose the wire request.
    fn generate_request(&self, config: &EnhancedConfig) -> EnhancedResult<Self::Request>;

    /// Send the request.
    fn service_call(&self, client: &dyn WireClient, request: Self::Request) -> WireFuture<Self::Response>;

    /// Turn the wire response into the caller's output.
    fn transform_response(&self, response: Self::Response) -> EnhancedResult<Self::Output>;

    /// Adjust a store error before it reaches the caller.
    fn transform_error(&self, error: EnhancedError) -> EnhancedError {
        error
    }
}

/// Compose, send and decode one single-table operation.
pub async fn execute<T, O>(
    operation: &O,
    schema: &TableSchema<T>,
    context: &OperationContext,
    extension: Option<&dyn Extension>,
    client: &dyn WireClient,
) -> EnhancedResult<O::Output>
where
    O: TableOperation<T>,
{
    let name = operation.operation_name();
    let request = operation.generate_request(schema, context, extension)?;
    tracing::debug!(operation = %name, table = %context.table_name(), "dispatching mapped operation");
    let response = operation
        .service_call(client, request)
        .await
        .map_err(|err| service_error(name, context.table_name(), err))?;
    operation.transform_response(response, schema, context, extension)
}

/// Compose, send and decode one multi-table operation.
pub async fn execute_database<O>(
    operation: &O,
    config: &EnhancedConfig,
    client: &dyn WireClient,
) -> EnhancedResult<O::Output>
where
    O: DatabaseOperation,
{
    let name = operation.operation_name();
    let request = operation.generate_request(config)?;
    tracing::debug!(operation = %name, "dispatching mapped operation");
    let response = operation
        .service_call(client, request)
        .await
        .map_err(|err| operation.transform_error(service_error(name, "*", err)))?;
    operation.transform_response(response)
}

fn service_error(operation: OperationName, table: &str, err: DynamoDBError) -> EnhancedError {
    let mapped = EnhancedError::from(err);
    if mapped.is_conditional_failure() {
        tracing::warn!(operation = %operation, table, error = %mapped, "write rejected by condition");
    } else {
        tracing::debug!(operation = %operation, table, error = %mapped, "store call failed");
    }
    mapped
}

// ---------------------------------------------------------------------------
// Shared composition helpers
// ---------------------------------------------------------------------------

/// Rendered expressions with their merged placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ComposedExpressions {
    pub(crate) condition: Option<String>,
    pub(crate) update: Option<String>,
    pub(crate) names: HashMap<String, String>,
    pub(crate) values: HashMap<String, AttributeValue>,
}

impl ComposedExpressions {
    /// Merge a condition and an optional update into one placeholder space.
    pub(crate) fn compose(condition: Option<Expression>, update: Option<Expression>) -> EnhancedResult<Self> {
        let mut out = Self::default();
        for (slot, fragment) in [(&mut out.condition, condition), (&mut out.update, update)] {
            let Some(fragment) = fragment else {
                continue;
            };
            let (text, names, values) = fragment.into_parts();
            out.names = crate::expression::join_names(&out.names, &names)?;
            out.values = crate::expression::join_values(&out.values, &values)?;
            *slot = Some(text);
        }
        Ok(out)
    }
}

/// AND the extension condition with the caller's, after checking that the
/// caller's fragment declares every placeholder it uses.
pub(crate) fn merge_conditions(
    extension: Option<Expression>,
    request: Option<&Expression>,
) -> EnhancedResult<Option<Expression>> {
    if let Some(request) = request {
        request.validate()?;
    }
    Expression::join(extension.as_ref(), request, AND)
}

/// Run `after_read` and convert an item into a record.
pub(crate) fn read_record<T: Default>(
    schema: &TableSchema<T>,
    extension: Option<&dyn Extension>,
    context: &OperationContext,
    item: Item,
) -> EnhancedResult<T> {
    let item = run_after_read(extension, item, schema.table_metadata(), context)?;
    Ok(schema.record_from(&item)?)
}

/// Like [`read_record`], mapping an empty image to `None`.
pub(crate) fn read_optional_record<T: Default>(
    schema: &TableSchema<T>,
    extension: Option<&dyn Extension>,
    context: &OperationContext,
    item: Option<Item>,
) -> EnhancedResult<Option<T>> {
    match item {
        Some(item) if !item.is_empty() => read_record(schema, extension, context, item).map(Some),
        _ => Ok(None),
    }
}
