//! Optimistic locking through a version attribute.

use dynamap_model::AttributeValue;

use super::{BeforeWriteContext, Extension, WriteModification};
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{Expression, key_ref};
use crate::operation::OperationName;

/// Value token carrying the version the caller last read.
pub const OLD_VERSION_VALUE: &str = ":old_version_value";

/// Version numbers observed and produced for one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionState<'a> {
    /// The version attribute.
    pub attribute_name: &'a str,
    /// Version carried by the item, `None` for a first write.
    pub current_value: Option<i64>,
    /// Version that will be written.
    pub next_value: i64,
    /// Version a first write starts from.
    pub start_at: i64,
    /// Step between versions.
    pub increment_by: i64,
}

impl VersionState<'_> {
    /// Condition guarding the write.
    ///
    /// First write: `attribute_not_exists(#AMZN_MAPPED_<v>)`.
    /// Otherwise: `#AMZN_MAPPED_<v> = :old_version_value`.
    #[must_use]
    pub fn condition(&self) -> Expression {
        let token = key_ref(self.attribute_name);
        match self.current_value {
            None => Expression::builder()
                .expression(format!("attribute_not_exists({token})"))
                .put_name(token, self.attribute_name)
                .build(),
            Some(current) => Expression::builder()
                .expression(format!("{token} = {OLD_VERSION_VALUE}"))
                .put_name(token, self.attribute_name)
                .put_value(OLD_VERSION_VALUE, AttributeValue::number(current))
                .build(),
        }
    }
}

/// Increments the schema's version attribute on every write and makes the
/// write conditional on the stored version being the one that was read.
///
/// Does nothing for schemas without a version attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedRecordExtension {
    start_at: i64,
    increment_by: i64,
}

impl Default for VersionedRecordExtension {
    fn default() -> Self {
        Self {
            start_at: 0,
            increment_by: 1,
        }
    }
}

/// Builder for [`VersionedRecordExtension`]. Bounds are checked in
/// [`build`](Self::build).
#[derive(Debug, Clone, Copy)]
pub struct VersionedRecordExtensionBuilder {
    start_at: i64,
    increment_by: i64,
}

impl VersionedRecordExtensionBuilder {
    /// Version a fresh record starts from.
    #[must_use]
    pub fn start_at(mut self, start_at: i64) -> Self {
        self.start_at = start_at;
        self
    }

    /// Step between versions.
    #[must_use]
    pub fn increment_by(mut self, increment_by: i64) -> Self {
        self.increment_by = increment_by;
        self
    }

    /// Validate and build.
    pub fn build(self) -> EnhancedResult<VersionedRecordExtension> {
        VersionedRecordExtension::new(self.start_at, self.increment_by)
    }
}

impl VersionedRecordExtension {
    /// Start building with the defaults (start 0, step 1).
    #[must_use]
    pub fn builder() -> VersionedRecordExtensionBuilder {
        let defaults = Self::default();
        VersionedRecordExtensionBuilder {
            start_at: defaults.start_at,
            increment_by: defaults.increment_by,
        }
    }

    /// Create with a custom start (at least 0) and step (at least 1).
    pub fn new(start_at: i64, increment_by: i64) -> EnhancedResult<Self> {
        if start_at < 0 {
            return Err(EnhancedError::validation(format!(
                "version start_at must be 0 or greater, got {start_at}"
            )));
        }
        if increment_by < 1 {
            return Err(EnhancedError::validation(format!(
                "version increment_by must be 1 or greater, got {increment_by}"
            )));
        }
        Ok(Self {
            start_at,
            increment_by,
        })
    }

    /// Start value of a fresh record's version sequence.
    #[must_use]
    pub fn start_at(&self) -> i64 {
        self.start_at
    }

    /// Step between versions.
    #[must_use]
    pub fn increment_by(&self) -> i64 {
        self.increment_by
    }

    /// Compute the version transition for `stored`, the version attribute's
    /// current wire value.
    pub fn version_state<'a>(
        &self,
        attribute_name: &'a str,
        stored: Option<&AttributeValue>,
    ) -> EnhancedResult<VersionState<'a>> {
        let current = match stored {
            None | Some(AttributeValue::Null(_)) => None,
            Some(AttributeValue::N(text)) => {
                let value = text.trim().parse::<i64>().map_err(|_| {
                    EnhancedError::Extension(anyhow::anyhow!(
                        "version attribute '{attribute_name}' holds '{text}', which is not an integer"
                    ))
                })?;
                (value != self.start_at).then_some(value)
            }
            Some(other) => {
                return Err(EnhancedError::Extension(anyhow::anyhow!(
                    "version attribute '{attribute_name}' must be a number, found {}",
                    other.type_descriptor()
                )));
            }
        };
        let base = current.unwrap_or(self.start_at);
        let next_value = base.checked_add(self.increment_by).ok_or_else(|| {
            EnhancedError::Extension(anyhow::anyhow!(
                "version attribute '{attribute_name}' overflowed"
            ))
        })?;
        Ok(VersionState {
            attribute_name,
            current_value: current,
            next_value,
            start_at: self.start_at,
            increment_by: self.increment_by,
        })
    }
}

impl Extension for VersionedRecordExtension {
    fn before_write(&self, context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
        // Deletes carry their own guard, see `DeleteItemRequest::for_record`.
        if context.operation == OperationName::DeleteItem {
            return Ok(WriteModification::default());
        }
        let Some(attribute) = context.table_metadata.version_attribute() else {
            return Ok(WriteModification::default());
        };
        let state = self.version_state(attribute, context.item.get(attribute))?;
        tracing::debug!(
            attribute,
            current = ?state.current_value,
            next = state.next_value,
            "versioned write"
        );

        let mut item = context.item.clone();
        item.insert(attribute.to_owned(), AttributeValue::number(state.next_value));
        Ok(WriteModification {
            transformed_item: Some(item),
            additional_condition: Some(state.condition()),
            update_expression: None,
        })
    }
}
