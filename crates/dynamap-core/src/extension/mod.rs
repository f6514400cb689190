//! Extension pipeline: hooks that rewrite items and add expressions around
//! every write and read.
//!
//! `before_write` runs after the record has been converted to an item and
//! before any expression is composed. It may replace the item, add a
//! condition and contribute update actions. `after_read` runs on every item
//! returned by the store before it is converted back to a record.

mod atomic_counter;
mod chain;
mod timestamp;
mod ttl;
mod versioned;

use std::fmt;

use dynamap_model::Item;

pub use atomic_counter::{AtomicCounter, AtomicCounterExtension};
pub use chain::ChainExtension;
pub use timestamp::AutoGeneratedTimestampExtension;
pub use ttl::{TimeToLive, TimeToLiveExtension};
pub use versioned::{
    OLD_VERSION_VALUE, VersionState, VersionedRecordExtension, VersionedRecordExtensionBuilder,
};

use crate::error::EnhancedResult;
use crate::expression::{Expression, UpdateExpression};
use crate::operation::{OperationContext, OperationName};
use crate::schema::TableMetadata;

/// What a `before_write` hook sees.
#[derive(Debug, Clone, Copy)]
pub struct BeforeWriteContext<'a> {
    /// Item about to be written (null markers included for updates).
    pub item: &'a Item,
    /// Key layout of the table.
    pub table_metadata: &'a TableMetadata,
    /// Operation being composed.
    pub operation: OperationName,
    /// Table and index targeted.
    pub operation_context: &'a OperationContext,
}

/// What an `after_read` hook sees.
#[derive(Debug, Clone, Copy)]
pub struct AfterReadContext<'a> {
    /// Item returned by the store.
    pub item: &'a Item,
    /// Key layout of the table.
    pub table_metadata: &'a TableMetadata,
    /// Table and index read.
    pub operation_context: &'a OperationContext,
}

/// Result of a `before_write` hook. `None` fields mean "no change".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteModification {
    /// Replacement item.
    pub transformed_item: Option<Item>,
    /// Condition to AND with the other conditions.
    pub additional_condition: Option<Expression>,
    /// Update actions to merge into an update.
    pub update_expression: Option<UpdateExpression>,
}

/// Result of an `after_read` hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadModification {
    /// Replacement item.
    pub transformed_item: Option<Item>,
}

/// A write/read hook. Both hooks default to "no change".
pub trait Extension: Send + Sync + fmt::Debug {
    /// Called before a write is composed.
    fn before_write(&self, context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
        let _ = context;
        Ok(WriteModification::default())
    }

    /// Called on every item read from the store.
    fn after_read(&self, context: &AfterReadContext<'_>) -> EnhancedResult<ReadModification> {
        let _ = context;
        Ok(ReadModification::default())
    }
}

/// Run `before_write` (if an extension is configured) and return the item to
/// write along with the extension's condition and update actions.
pub(crate) fn run_before_write(
    extension: Option<&dyn Extension>,
    item: Item,
    table_metadata: &TableMetadata,
    operation: OperationName,
    operation_context: &OperationContext,
) -> EnhancedResult<(Item, WriteModification)> {
    let Some(extension) = extension else {
        return Ok((item, WriteModification::default()));
    };
    let mut modification = extension.before_write(&BeforeWriteContext {
        item: &item,
        table_metadata,
        operation,
        operation_context,
    })?;
    let item = modification.transformed_item.take().unwrap_or(item);
    Ok((item, modification))
}

/// Run `after_read` (if an extension is configured) and return the item to
/// hydrate.
pub(crate) fn run_after_read(
    extension: Option<&dyn Extension>,
    item: Item,
    table_metadata: &TableMetadata,
    operation_context: &OperationContext,
) -> EnhancedResult<Item> {
    let Some(extension) = extension else {
        return Ok(item);
    };
    let modification = extension.after_read(&AfterReadContext {
        item: &item,
        table_metadata,
        operation_context,
    })?;
    Ok(modification.transformed_item.unwrap_or(item))
}
