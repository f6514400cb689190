//! In-memory [`WireClient`].
//!
//! Every write runs under one store-wide lock, so a condition is evaluated
//! and its write applied with nothing in between. Transactions check every
//! sub-request before applying any of them.

use std::collections::{HashMap, HashSet};
use std::future::ready;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use dynamap_core::client::{WireClient, WireFuture};
use dynamap_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use dynamap_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use dynamap_model::types::{
    CancellationReason, ItemResponse, ReturnValue, ReturnValuesOnConditionCheckFailure,
    TransactWriteItem,
};
use dynamap_model::{AttributeValue, DynamoDBError, Item};

use crate::config::LocalConfig;
use crate::error::{attribute_error_to_dynamodb, expression_error_to_dynamodb, storage_error_to_dynamodb};
use crate::expression::{EvalContext, Expr, UpdateExpr, parse_condition, parse_projection, parse_update};
use crate::storage::{KeySchema, LocalStore, PrimaryKey, TableStorage, extract_primary_key};

const MAX_BATCH_GET_KEYS: usize = 100;
const MAX_BATCH_WRITE_REQUESTS: usize = 25;
const MAX_TRANSACT_ITEMS: usize = 100;

/// A DynamoDB-compatible store held in memory.
///
/// # Examples
///
/// ```
/// use dynamap_local::LocalClient;
///
/// let client = LocalClient::default();
/// client.create_table("orders", "customer", Some("order_id"));
/// assert_eq!(client.item_count("orders").ok(), Some(0));
/// ```
#[derive(Debug, Default)]
pub struct LocalClient {
    store: LocalStore,
    config: LocalConfig,
    write_lock: Mutex<()>,
}

impl LocalClient {
    /// Empty store with the given settings.
    #[must_use]
    pub fn new(config: LocalConfig) -> Self {
        Self {
            store: LocalStore::default(),
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Settings in effect.
    #[must_use]
    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Register a table keyed by `partition_key` and, optionally, `sort_key`.
    /// Re-creating a table drops its items.
    pub fn create_table(&self, name: impl Into<String>, partition_key: &str, sort_key: Option<&str>) {
        let name = name.into();
        debug!(table = %name, partition_key, ?sort_key, "created table");
        self.store.create_table(
            name,
            KeySchema {
                partition_key: partition_key.to_owned(),
                sort_key: sort_key.map(str::to_owned),
            },
        );
    }

    /// Number of items stored in `table`.
    pub fn item_count(&self, table: &str) -> Result<u64, DynamoDBError> {
        Ok(self.store.require_table(table)?.item_count())
    }
}

// ---------------------------------------------------------------------------
// Prepared writes
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum WriteKind {
    Put(Item),
    Delete,
    Update(Option<UpdateExpr>),
    Check,
}

/// A validated write, ready to be checked and applied under the write lock.
#[derive(Debug)]
struct PreparedWrite {
    table_name: String,
    table: Arc<TableStorage>,
    key: PrimaryKey,
    key_item: Item,
    kind: WriteKind,
    condition: Option<Expr>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    return_old_on_failure: bool,
}

/// Images of an item around a write.
#[derive(Debug)]
struct Resolved {
    old: Option<Item>,
    new: Option<Item>,
    persist: bool,
}

#[derive(Debug)]
enum WriteFailure {
    ConditionFailed(Option<Item>),
    Invalid(DynamoDBError),
}

impl WriteFailure {
    fn into_error(self) -> DynamoDBError {
        match self {
            Self::ConditionFailed(_) => DynamoDBError::conditional_check_failed("The conditional request failed"),
            Self::Invalid(err) => err,
        }
    }

    fn into_reason(self) -> CancellationReason {
        match self {
            Self::ConditionFailed(item) => CancellationReason::conditional_check_failed(item),
            Self::Invalid(err) => CancellationReason::validation_error(err.message),
        }
    }
}

/// Loose request parts shared by every write shape.
struct WriteParts {
    table_name: String,
    key_source: Item,
    kind: WriteKind,
    condition: Option<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    on_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

impl LocalClient {
    fn prepare(&self, parts: WriteParts) -> Result<PreparedWrite, DynamoDBError> {
        let table = self.store.require_table(&parts.table_name)?;
        let key = match &parts.kind {
            WriteKind::Put(item) => extract_primary_key(table.key_schema(), item),
            _ => table.key_of(&parts.key_source),
        }
        .map_err(storage_error_to_dynamodb)?;
        let key_item = key_attributes(table.key_schema(), &parts.key_source);

        // For puts the key source is the whole item.
        if self.config.strict_validation {
            validate_values(parts.key_source.values())?;
            validate_values(parts.values.values())?;
        }
        let condition = match parts.condition.as_deref() {
            Some(text) if text.trim().is_empty() => {
                return Err(DynamoDBError::validation("Invalid ConditionExpression: The expression can not be empty;"));
            }
            Some(text) => Some(parse_condition(text).map_err(expression_error_to_dynamodb)?),
            None => None,
        };
        if let WriteKind::Update(Some(update)) = &parts.kind {
            reject_key_targets(table.key_schema(), update, &parts.names)?;
        }

        Ok(PreparedWrite {
            table_name: parts.table_name,
            table,
            key,
            key_item,
            kind: parts.kind,
            condition,
            names: parts.names,
            values: parts.values,
            return_old_on_failure: parts.on_failure == Some(ReturnValuesOnConditionCheckFailure::AllOld),
        })
    }
}

impl PreparedWrite {
    /// Evaluate the condition against the stored item and compute the new
    /// image. Nothing is written.
    fn resolve(&self) -> Result<Resolved, WriteFailure> {
        let old = self.table.get_item(&self.key);
        let empty = Item::new();
        let ctx = EvalContext {
            item: old.as_ref().unwrap_or(&empty),
            names: &self.names,
            values: &self.values,
        };
        if let Some(condition) = &self.condition {
            let passed = ctx
                .evaluate(condition)
                .map_err(|e| WriteFailure::Invalid(expression_error_to_dynamodb(e)))?;
            if !passed {
                debug!(table = %self.table_name, "condition check failed");
                let item = if self.return_old_on_failure { old } else { None };
                return Err(WriteFailure::ConditionFailed(item));
            }
        }

        let (new, persist) = match &self.kind {
            WriteKind::Put(item) => (Some(item.clone()), true),
            WriteKind::Delete => (None, old.is_some()),
            WriteKind::Check => (old.clone(), false),
            WriteKind::Update(update) => {
                let base = old.clone().unwrap_or_else(|| self.key_item.clone());
                let image = match update {
                    Some(update) => EvalContext { item: &base, ..ctx }
                        .apply_update(update)
                        .map_err(|e| WriteFailure::Invalid(expression_error_to_dynamodb(e)))?,
                    None => base,
                };
                let persist = old.is_some() || update.as_ref().is_none_or(|u| !u.is_subtractive());
                (Some(image), persist)
            }
        };
        Ok(Resolved { old, new, persist })
    }

    fn commit(&self, resolved: &Resolved) -> Result<(), DynamoDBError> {
        if !resolved.persist {
            return Ok(());
        }
        match (&self.kind, &resolved.new) {
            (WriteKind::Delete, _) => {
                self.table.delete_item(&self.key);
            }
            (_, Some(item)) => {
                self.table.put_item(item.clone()).map_err(storage_error_to_dynamodb)?;
            }
            (_, None) => {}
        }
        Ok(())
    }

    fn same_item(&self, other: &Self) -> bool {
        self.table_name == other.table_name && self.key == other.key
    }
}

// ---------------------------------------------------------------------------
// Single-item operations
// ---------------------------------------------------------------------------

impl LocalClient {
    /// Handle `GetItem`.
    pub fn handle_get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        let table = self.store.require_table(&input.table_name)?;
        let key = table.key_of(&input.key).map_err(storage_error_to_dynamodb)?;
        let item = table
            .get_item(&key)
            .map(|item| project(item, input.projection_expression.as_deref(), &input.expression_attribute_names))
            .transpose()?;
        debug!(table = %input.table_name, found = item.is_some(), "get_item");
        Ok(GetItemOutput {
            item,
            ..GetItemOutput::default()
        })
    }

    /// Handle `PutItem`.
    pub fn handle_put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        let return_values = allowed_return_values(input.return_values, &[ReturnValue::None, ReturnValue::AllOld])?;
        let write = self.prepare(WriteParts {
            table_name: input.table_name,
            key_source: input.item.clone(),
            kind: WriteKind::Put(input.item),
            condition: input.condition_expression,
            names: input.expression_attribute_names,
            values: input.expression_attribute_values,
            on_failure: input.return_values_on_condition_check_failure,
        })?;

        let resolved = {
            let _guard = self.write_lock.lock();
            let resolved = write.resolve().map_err(WriteFailure::into_error)?;
            write.commit(&resolved)?;
            resolved
        };
        debug!(table = %write.table_name, replaced = resolved.old.is_some(), "put_item");
        Ok(PutItemOutput {
            attributes: select_image(return_values, resolved, &[]),
            ..PutItemOutput::default()
        })
    }

    /// Handle `UpdateItem`.
    pub fn handle_update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, DynamoDBError> {
        let return_values = input.return_values.unwrap_or_default();
        let update = input
            .update_expression
            .as_deref()
            .map(parse_update)
            .transpose()
            .map_err(expression_error_to_dynamodb)?;
        let targets: Vec<String> = update
            .as_ref()
            .map(|u| {
                u.target_paths()
                    .filter_map(|p| p.top_level_name(&input.expression_attribute_names))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let write = self.prepare(WriteParts {
            table_name: input.table_name,
            key_source: input.key,
            kind: WriteKind::Update(update),
            condition: input.condition_expression,
            names: input.expression_attribute_names,
            values: input.expression_attribute_values,
            on_failure: input.return_values_on_condition_check_failure,
        })?;

        let resolved = {
            let _guard = self.write_lock.lock();
            let resolved = write.resolve().map_err(WriteFailure::into_error)?;
            write.commit(&resolved)?;
            resolved
        };
        debug!(table = %write.table_name, created = resolved.old.is_none(), "update_item");
        Ok(UpdateItemOutput {
            attributes: select_image(return_values, resolved, &targets),
            ..UpdateItemOutput::default()
        })
    }

    /// Handle `DeleteItem`.
    pub fn handle_delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, DynamoDBError> {
        let return_values = allowed_return_values(input.return_values, &[ReturnValue::None, ReturnValue::AllOld])?;
        let write = self.prepare(WriteParts {
            table_name: input.table_name,
            key_source: input.key,
            kind: WriteKind::Delete,
            condition: input.condition_expression,
            names: input.expression_attribute_names,
            values: input.expression_attribute_values,
            on_failure: input.return_values_on_condition_check_failure,
        })?;

        let resolved = {
            let _guard = self.write_lock.lock();
            let resolved = write.resolve().map_err(WriteFailure::into_error)?;
            write.commit(&resolved)?;
            resolved
        };
        debug!(table = %write.table_name, deleted = resolved.old.is_some(), "delete_item");
        Ok(DeleteItemOutput {
            attributes: select_image(return_values, resolved, &[]),
            ..DeleteItemOutput::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

impl LocalClient {
    /// Handle `BatchGetItem`. Every key is always processed.
    pub fn handle_batch_get_item(&self, input: BatchGetItemInput) -> Result<BatchGetItemOutput, DynamoDBError> {
        let total: usize = input.request_items.values().map(|k| k.keys.len()).sum();
        if total == 0 || total > MAX_BATCH_GET_KEYS {
            return Err(DynamoDBError::validation(format!(
                "Too many items requested for the BatchGetItem call: {total} (must be between 1 and {MAX_BATCH_GET_KEYS})"
            )));
        }

        let mut responses = HashMap::with_capacity(input.request_items.len());
        for (table_name, request) in input.request_items {
            let table = self.store.require_table(&table_name)?;
            let keys = request
                .keys
                .iter()
                .map(|key| table.key_of(key).map_err(storage_error_to_dynamodb))
                .collect::<Result<Vec<_>, _>>()?;
            if has_duplicates(&keys) {
                return Err(DynamoDBError::validation("Provided list of item keys contains duplicates"));
            }
            let mut items = Vec::with_capacity(keys.len());
            for key in &keys {
                if let Some(item) = table.get_item(key) {
                    items.push(project(
                        item,
                        request.projection_expression.as_deref(),
                        &request.expression_attribute_names,
                    )?);
                }
            }
            debug!(table = %table_name, requested = keys.len(), found = items.len(), "batch_get_item");
            responses.insert(table_name, items);
        }
        Ok(BatchGetItemOutput {
            responses,
            ..BatchGetItemOutput::default()
        })
    }

    /// Handle `BatchWriteItem`. Every request is always processed.
    pub fn handle_batch_write_item(&self, input: BatchWriteItemInput) -> Result<BatchWriteItemOutput, DynamoDBError> {
        let total: usize = input.request_items.values().map(Vec::len).sum();
        if total == 0 || total > MAX_BATCH_WRITE_REQUESTS {
            return Err(DynamoDBError::validation(format!(
                "Too many items requested for the BatchWriteItem call: {total} (must be between 1 and {MAX_BATCH_WRITE_REQUESTS})"
            )));
        }

        let mut writes = Vec::with_capacity(total);
        for (table_name, requests) in input.request_items {
            for request in requests {
                let (key_source, kind) = match (request.put_request, request.delete_request) {
                    (Some(put), None) => (put.item.clone(), WriteKind::Put(put.item)),
                    (None, Some(delete)) => (delete.key, WriteKind::Delete),
                    _ => {
                        return Err(DynamoDBError::validation(
                            "A write request must contain exactly one of PutRequest or DeleteRequest",
                        ));
                    }
                };
                writes.push(self.prepare(WriteParts {
                    table_name: table_name.clone(),
                    key_source,
                    kind,
                    condition: None,
                    names: HashMap::new(),
                    values: HashMap::new(),
                    on_failure: None,
                })?);
            }
        }
        if writes.iter().enumerate().any(|(i, w)| writes[..i].iter().any(|o| o.same_item(w))) {
            return Err(DynamoDBError::validation("Provided list of item keys contains duplicates"));
        }

        let _guard = self.write_lock.lock();
        for write in &writes {
            let resolved = write.resolve().map_err(WriteFailure::into_error)?;
            write.commit(&resolved)?;
        }
        debug!(requests = writes.len(), "batch_write_item");
        Ok(BatchWriteItemOutput::default())
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

impl LocalClient {
    /// Handle `TransactWriteItems`: either every sub-request is applied or
    /// none is, and a cancellation reports one reason per sub-request.
    pub fn handle_transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError> {
        check_transaction_size(input.transact_items.len())?;
        let writes = input
            .transact_items
            .into_iter()
            .map(|item| self.prepare_transact_item(item))
            .collect::<Result<Vec<_>, _>>()?;
        if writes.iter().enumerate().any(|(i, w)| writes[..i].iter().any(|o| o.same_item(w))) {
            return Err(DynamoDBError::validation(
                "Transaction request cannot include multiple operations on one item",
            ));
        }

        let _guard = self.write_lock.lock();
        let mut resolved = Vec::with_capacity(writes.len());
        let mut reasons = Vec::with_capacity(writes.len());
        for write in &writes {
            match write.resolve() {
                Ok(r) => {
                    reasons.push(CancellationReason::none());
                    resolved.push(r);
                }
                Err(failure) => reasons.push(failure.into_reason()),
            }
        }
        if reasons.iter().any(CancellationReason::is_failure) {
            warn!(
                failed = reasons.iter().filter(|r| r.is_failure()).count(),
                "transaction cancelled"
            );
            return Err(DynamoDBError::transaction_canceled(reasons));
        }
        for (write, r) in writes.iter().zip(&resolved) {
            write.commit(r)?;
        }
        debug!(items = writes.len(), "transact_write_items");
        Ok(TransactWriteItemsOutput::default())
    }

    fn prepare_transact_item(&self, item: TransactWriteItem) -> Result<PreparedWrite, DynamoDBError> {
        let parts = match item {
            TransactWriteItem { put: Some(put), condition_check: None, delete: None, update: None } => WriteParts {
                table_name: put.table_name,
                key_source: put.item.clone(),
                kind: WriteKind::Put(put.item),
                condition: put.condition_expression,
                names: put.expression_attribute_names,
                values: put.expression_attribute_values,
                on_failure: put.return_values_on_condition_check_failure,
            },
            TransactWriteItem { delete: Some(delete), condition_check: None, put: None, update: None } => WriteParts {
                table_name: delete.table_name,
                key_source: delete.key,
                kind: WriteKind::Delete,
                condition: delete.condition_expression,
                names: delete.expression_attribute_names,
                values: delete.expression_attribute_values,
                on_failure: delete.return_values_on_condition_check_failure,
            },
            TransactWriteItem { update: Some(update), condition_check: None, put: None, delete: None } => {
                let expression = parse_update(&update.update_expression).map_err(expression_error_to_dynamodb)?;
                WriteParts {
                    table_name: update.table_name,
                    key_source: update.key,
                    kind: WriteKind::Update(Some(expression)),
                    condition: update.condition_expression,
                    names: update.expression_attribute_names,
                    values: update.expression_attribute_values,
                    on_failure: update.return_values_on_condition_check_failure,
                }
            }
            TransactWriteItem { condition_check: Some(check), put: None, delete: None, update: None } => WriteParts {
                table_name: check.table_name,
                key_source: check.key,
                kind: WriteKind::Check,
                condition: Some(check.condition_expression),
                names: check.expression_attribute_names,
                values: check.expression_attribute_values,
                on_failure: check.return_values_on_condition_check_failure,
            },
            _ => {
                return Err(DynamoDBError::validation(
                    "A transact write item must contain exactly one of ConditionCheck, Put, Delete or Update",
                ));
            }
        };
        self.prepare(parts)
    }

    /// Handle `TransactGetItems`. Responses follow request order.
    pub fn handle_transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError> {
        check_transaction_size(input.transact_items.len())?;
        let _guard = self.write_lock.lock();
        let responses = input
            .transact_items
            .into_iter()
            .map(|item| -> Result<ItemResponse, DynamoDBError> {
                let get = item.get;
                let table = self.store.require_table(&get.table_name)?;
                let key = table.key_of(&get.key).map_err(storage_error_to_dynamodb)?;
                let item = table
                    .get_item(&key)
                    .map(|item| project(item, get.projection_expression.as_deref(), &get.expression_attribute_names))
                    .transpose()?;
                Ok(ItemResponse { item })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(items = responses.len(), "transact_get_items");
        Ok(TransactGetItemsOutput {
            responses,
            ..TransactGetItemsOutput::default()
        })
    }
}

impl WireClient for LocalClient {
    fn get_item(&self, input: GetItemInput) -> WireFuture<GetItemOutput> {
        Box::pin(ready(self.handle_get_item(input)))
    }

    fn put_item(&self, input: PutItemInput) -> WireFuture<PutItemOutput> {
        Box::pin(ready(self.handle_put_item(input)))
    }

    fn update_item(&self, input: UpdateItemInput) -> WireFuture<UpdateItemOutput> {
        Box::pin(ready(self.handle_update_item(input)))
    }

    fn delete_item(&self, input: DeleteItemInput) -> WireFuture<DeleteItemOutput> {
        Box::pin(ready(self.handle_delete_item(input)))
    }

    fn batch_get_item(&self, input: BatchGetItemInput) -> WireFuture<BatchGetItemOutput> {
        Box::pin(ready(self.handle_batch_get_item(input)))
    }

    fn batch_write_item(&self, input: BatchWriteItemInput) -> WireFuture<BatchWriteItemOutput> {
        Box::pin(ready(self.handle_batch_write_item(input)))
    }

    fn transact_write_items(&self, input: TransactWriteItemsInput) -> WireFuture<TransactWriteItemsOutput> {
        Box::pin(ready(self.handle_transact_write_items(input)))
    }

    fn transact_get_items(&self, input: TransactGetItemsInput) -> WireFuture<TransactGetItemsOutput> {
        Box::pin(ready(self.handle_transact_get_items(input)))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn allowed_return_values(requested: Option<ReturnValue>, allowed: &[ReturnValue]) -> Result<ReturnValue, DynamoDBError> {
    let requested = requested.unwrap_or_default();
    if allowed.contains(&requested) {
        Ok(requested)
    } else {
        Err(DynamoDBError::validation(format!(
            "Return values set to invalid value for this operation: {requested}"
        )))
    }
}

/// Image returned for `return_values`. `targets` names the top-level
/// attributes an update touched.
fn select_image(return_values: ReturnValue, resolved: Resolved, targets: &[String]) -> Item {
    let pick = |image: Option<Item>| -> Item {
        image
            .map(|item| item.into_iter().filter(|(name, _)| targets.contains(name)).collect())
            .unwrap_or_default()
    };
    match return_values {
        ReturnValue::None => Item::new(),
        ReturnValue::AllOld => resolved.old.unwrap_or_default(),
        ReturnValue::AllNew => resolved.new.unwrap_or_default(),
        ReturnValue::UpdatedOld => pick(resolved.old),
        ReturnValue::UpdatedNew => pick(resolved.new),
    }
}

fn project(item: Item, projection: Option<&str>, names: &HashMap<String, String>) -> Result<Item, DynamoDBError> {
    let Some(projection) = projection else {
        return Ok(item);
    };
    let paths = parse_projection(projection).map_err(expression_error_to_dynamodb)?;
    let values = HashMap::new();
    EvalContext {
        item: &item,
        names,
        values: &values,
    }
    .apply_projection(&paths)
    .map_err(expression_error_to_dynamodb)
}

fn key_attributes(key_schema: &KeySchema, source: &Item) -> Item {
    source
        .iter()
        .filter(|(name, _)| key_schema.is_key_attribute(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn reject_key_targets(
    key_schema: &KeySchema,
    update: &UpdateExpr,
    names: &HashMap<String, String>,
) -> Result<(), DynamoDBError> {
    for path in update.target_paths() {
        let name = path.top_level_name(names).ok_or_else(|| {
            DynamoDBError::validation(format!(
                "Invalid UpdateExpression: An expression attribute name used in the document path is not defined; attribute name: {path}"
            ))
        })?;
        if key_schema.is_key_attribute(name) {
            return Err(DynamoDBError::validation(format!(
                "One or more parameter values were invalid: Cannot update attribute {name}. This attribute is part of the key"
            )));
        }
    }
    Ok(())
}

fn validate_values<'a>(values: impl IntoIterator<Item = &'a AttributeValue>) -> Result<(), DynamoDBError> {
    values
        .into_iter()
        .try_for_each(AttributeValue::validate)
        .map_err(attribute_error_to_dynamodb)
}

fn has_duplicates(keys: &[PrimaryKey]) -> bool {
    let mut seen = HashSet::with_capacity(keys.len());
    !keys.iter().all(|key| seen.insert(key))
}

fn check_transaction_size(len: usize) -> Result<(), DynamoDBError> {
    if len == 0 || len > MAX_TRANSACT_ITEMS {
        return Err(DynamoDBError::validation(format!(
            "Member must have length less than or equal to {MAX_TRANSACT_ITEMS} and at least 1, found {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use dynamap_model::DynamoDBErrorCode;
    use dynamap_model::types::{ConditionCheck, Put, Update, WriteRequest};

    use super::*;

    fn client() -> LocalClient {
        let client = LocalClient::default();
        client.create_table("orders", "customer", Some("order_id"));
        client
    }

    fn key(customer: &str, order_id: &str) -> Item {
        Item::from([
            ("customer".to_owned(), AttributeValue::from(customer)),
            ("order_id".to_owned(), AttributeValue::from(order_id)),
        ])
    }

    fn order(customer: &str, order_id: &str, version: i64) -> Item {
        let mut item = key(customer, order_id);
        item.insert("version".to_owned(), AttributeValue::number(version));
        item
    }

    fn version_names() -> HashMap<String, String> {
        HashMap::from([("#v".to_owned(), "version".to_owned())])
    }

    async fn stored(client: &LocalClient, key: Item) -> Option<Item> {
        client
            .get_item(GetItemInput {
                table_name: "orders".to_owned(),
                key,
                ..GetItemInput::default()
            })
            .await
            .expect("get")
            .item
    }

    #[tokio::test]
    async fn test_should_put_only_when_item_is_absent() {
        let client = client();
        let put = |version| PutItemInput {
            table_name: "orders".to_owned(),
            item: order("c1", "o1", version),
            condition_expression: Some("attribute_not_exists(#v)".to_owned()),
            expression_attribute_names: version_names(),
            ..PutItemInput::default()
        };
        client.put_item(put(1)).await.expect("first put");
        let err = client.put_item(put(2)).await.expect_err("second put");
        assert_eq!(err.code, DynamoDBErrorCode::ConditionalCheckFailedException);
        let item = stored(&client, key("c1", "o1")).await.expect("item");
        assert_eq!(item.get("version"), Some(&AttributeValue::number(1)));
    }

    #[tokio::test]
    async fn test_should_reject_unsupported_return_values() {
        let client = client();
        let err = client
            .put_item(PutItemInput {
                table_name: "orders".to_owned(),
                item: order("c1", "o1", 1),
                return_values: Some(ReturnValue::AllNew),
                ..PutItemInput::default()
            })
            .await
            .expect_err("invalid");
        assert_eq!(err.code, DynamoDBErrorCode::ValidationException);
    }

    #[tokio::test]
    async fn test_should_update_with_version_guard_and_return_images() {
        let client = client();
        client.handle_put_item(PutItemInput {
            table_name: "orders".to_owned(),
            item: order("c1", "o1", 1),
            ..PutItemInput::default()
        })
        .expect("seed");

        let update = |old: i64| UpdateItemInput {
            table_name: "orders".to_owned(),
            key: key("c1", "o1"),
            update_expression: Some("SET #v = :new".to_owned()),
            condition_expression: Some("#v = :old".to_owned()),
            expression_attribute_names: version_names(),
            expression_attribute_values: HashMap::from([
                (":old".to_owned(), AttributeValue::number(old)),
                (":new".to_owned(), AttributeValue::number(old + 1)),
            ]),
            return_values: Some(ReturnValue::UpdatedNew),
            ..UpdateItemInput::default()
        };
        let output = client.update_item(update(1)).await.expect("update");
        assert_eq!(output.attributes, Item::from([("version".to_owned(), AttributeValue::number(2))]));

        let err = client.update_item(update(1)).await.expect_err("stale");
        assert_eq!(err.code, DynamoDBErrorCode::ConditionalCheckFailedException);
    }

    #[tokio::test]
    async fn test_should_create_item_from_key_only_update() {
        let client = client();
        let output = client
            .update_item(UpdateItemInput {
                table_name: "orders".to_owned(),
                key: key("c1", "o1"),
                return_values: Some(ReturnValue::AllNew),
                ..UpdateItemInput::default()
            })
            .await
            .expect("update");
        assert_eq!(output.attributes, key("c1", "o1"));
        assert_eq!(client.item_count("orders").ok(), Some(1));
    }

    #[tokio::test]
    async fn test_should_not_store_remove_only_update_of_missing_item() {
        let client = client();
        client
            .update_item(UpdateItemInput {
                table_name: "orders".to_owned(),
                key: key("c1", "o1"),
                update_expression: Some("REMOVE note".to_owned()),
                ..UpdateItemInput::default()
            })
            .await
            .expect("update");
        assert_eq!(client.item_count("orders").ok(), Some(0));
    }

    #[tokio::test]
    async fn test_should_reject_update_of_key_attribute() {
        let client = client();
        let err = client
            .update_item(UpdateItemInput {
                table_name: "orders".to_owned(),
                key: key("c1", "o1"),
                update_expression: Some("SET customer = :c".to_owned()),
                expression_attribute_values: HashMap::from([(":c".to_owned(), AttributeValue::from("c2"))]),
                ..UpdateItemInput::default()
            })
            .await
            .expect_err("key update");
        assert!(err.message.contains("part of the key"));
    }

    #[tokio::test]
    async fn test_should_delete_and_return_old_item() {
        let client = client();
        client
            .handle_put_item(PutItemInput {
                table_name: "orders".to_owned(),
                item: order("c1", "o1", 3),
                ..PutItemInput::default()
            })
            .expect("seed");
        let output = client
            .delete_item(DeleteItemInput {
                table_name: "orders".to_owned(),
                key: key("c1", "o1"),
                return_values: Some(ReturnValue::AllOld),
                ..DeleteItemInput::default()
            })
            .await
            .expect("delete");
        assert_eq!(output.attributes, order("c1", "o1", 3));
        assert!(stored(&client, key("c1", "o1")).await.is_none());
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_table() {
        let client = client();
        let err = client
            .get_item(GetItemInput {
                table_name: "missing".to_owned(),
                key: key("c1", "o1"),
                ..GetItemInput::default()
            })
            .await
            .expect_err("missing table");
        assert_eq!(err.code, DynamoDBErrorCode::ResourceNotFoundException);
    }

    #[tokio::test]
    async fn test_should_reject_malformed_numbers_when_strict() {
        let client = client();
        let mut item = key("c1", "o1");
        item.insert("total".to_owned(), AttributeValue::N("twelve".to_owned()));
        let err = client
            .put_item(PutItemInput {
                table_name: "orders".to_owned(),
                item,
                ..PutItemInput::default()
            })
            .await
            .expect_err("invalid number");
        assert_eq!(err.code, DynamoDBErrorCode::ValidationException);
    }

    #[tokio::test]
    async fn test_should_cancel_whole_transaction_with_reasons() {
        let client = client();
        client
            .handle_put_item(PutItemInput {
                table_name: "orders".to_owned(),
                item: order("c1", "existing", 1),
                ..PutItemInput::default()
            })
            .expect("seed");

        let input = TransactWriteItemsInput {
            transact_items: vec![
                TransactWriteItem {
                    put: Some(Put {
                        table_name: "orders".to_owned(),
                        item: order("c1", "new", 1),
                        ..Put::default()
                    }),
                    ..TransactWriteItem::default()
                },
                TransactWriteItem {
                    condition_check: Some(ConditionCheck {
                        table_name: "orders".to_owned(),
                        key: key("c1", "existing"),
                        condition_expression: "#v = :v".to_owned(),
                        expression_attribute_names: version_names(),
                        expression_attribute_values: HashMap::from([(":v".to_owned(), AttributeValue::number(7))]),
                        return_values_on_condition_check_failure: Some(ReturnValuesOnConditionCheckFailure::AllOld),
                    }),
                    ..TransactWriteItem::default()
                },
            ],
            ..TransactWriteItemsInput::default()
        };
        let err = client.transact_write_items(input).await.expect_err("cancelled");
        assert_eq!(err.code, DynamoDBErrorCode::TransactionCanceledException);
        assert_eq!(err.cancellation_reasons.len(), 2);
        assert!(!err.cancellation_reasons[0].is_failure());
        assert_eq!(
            err.cancellation_reasons[1].code.as_deref(),
            Some(CancellationReason::CONDITIONAL_CHECK_FAILED)
        );
        assert_eq!(err.cancellation_reasons[1].item, Some(order("c1", "existing", 1)));
        assert!(stored(&client, key("c1", "new")).await.is_none());
    }

    #[tokio::test]
    async fn test_should_apply_transaction_and_counter_update() {
        let client = client();
        let update = Update {
            table_name: "orders".to_owned(),
            key: key("c1", "o1"),
            update_expression: "SET #c = if_not_exists(#c, :start) + :delta".to_owned(),
            expression_attribute_names: HashMap::from([("#c".to_owned(), "count".to_owned())]),
            expression_attribute_values: HashMap::from([
                (":start".to_owned(), AttributeValue::number(0)),
                (":delta".to_owned(), AttributeValue::number(5)),
            ]),
            ..Update::default()
        };
        let input = TransactWriteItemsInput {
            transact_items: vec![TransactWriteItem {
                update: Some(update),
                ..TransactWriteItem::default()
            }],
            ..TransactWriteItemsInput::default()
        };
        client.transact_write_items(input.clone()).await.expect("first");
        client.transact_write_items(input).await.expect("second");
        let item = stored(&client, key("c1", "o1")).await.expect("item");
        assert_eq!(item.get("count"), Some(&AttributeValue::number(10)));
    }

    #[tokio::test]
    async fn test_should_reject_two_operations_on_one_item() {
        let client = client();
        let put = TransactWriteItem {
            put: Some(Put {
                table_name: "orders".to_owned(),
                item: order("c1", "o1", 1),
                ..Put::default()
            }),
            ..TransactWriteItem::default()
        };
        let err = client
            .transact_write_items(TransactWriteItemsInput {
                transact_items: vec![put.clone(), put],
                ..TransactWriteItemsInput::default()
            })
            .await
            .expect_err("duplicate");
        assert_eq!(err.code, DynamoDBErrorCode::ValidationException);
    }

    #[tokio::test]
    async fn test_should_batch_write_and_read() {
        let client = client();
        client
            .batch_write_item(BatchWriteItemInput {
                request_items: HashMap::from([(
                    "orders".to_owned(),
                    vec![WriteRequest::put(order("c1", "o1", 1)), WriteRequest::put(order("c1", "o2", 1))],
                )]),
                ..BatchWriteItemInput::default()
            })
            .await
            .expect("batch write");

        let output = client
            .batch_get_item(BatchGetItemInput {
                request_items: HashMap::from([(
                    "orders".to_owned(),
                    dynamap_model::types::KeysAndAttributes {
                        keys: vec![key("c1", "o1"), key("c1", "missing")],
                        projection_expression: Some("#v".to_owned()),
                        expression_attribute_names: version_names(),
                        consistent_read: None,
                    },
                )]),
                ..BatchGetItemInput::default()
            })
            .await
            .expect("batch get");
        assert_eq!(
            output.responses.get("orders"),
            Some(&vec![Item::from([("version".to_owned(), AttributeValue::number(1))])])
        );
    }

    #[tokio::test]
    async fn test_should_reject_duplicate_batch_keys() {
        let client = client();
        let err = client
            .batch_write_item(BatchWriteItemInput {
                request_items: HashMap::from([(
                    "orders".to_owned(),
                    vec![WriteRequest::put(order("c1", "o1", 1)), WriteRequest::delete(key("c1", "o1"))],
                )]),
                ..BatchWriteItemInput::default()
            })
            .await
            .expect_err("duplicate");
        assert!(err.message.contains("duplicates"));
    }
}
