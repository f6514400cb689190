//! Run several extensions as one.

use std::sync::Arc;

use super::{AfterReadContext, BeforeWriteContext, Extension, ReadModification, WriteModification};
use crate::error::EnhancedResult;
use crate::expression::{AND, Expression, UpdateExpression};

/// Ordered list of extensions.
///
/// `before_write` runs first to last, each extension seeing the item the
/// previous one produced. Conditions are AND-joined and update expressions
/// concatenated. `after_read` runs last to first.
#[derive(Debug, Clone, Default)]
pub struct ChainExtension {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ChainExtension {
    /// Chain `extensions` in declaration order.
    #[must_use]
    pub fn new(extensions: Vec<Arc<dyn Extension>>) -> Self {
        Self { extensions }
    }

    /// Number of chained extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Returns `true` if nothing is chained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Extension for ChainExtension {
    fn before_write(&self, context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
        let mut item = None;
        let mut condition: Option<Expression> = None;
        let mut update: Option<UpdateExpression> = None;

        for extension in &self.extensions {
            let modification = extension.before_write(&BeforeWriteContext {
                item: item.as_ref().unwrap_or(context.item),
                ..*context
            })?;
            if let Some(next) = modification.transformed_item {
                item = Some(next);
            }
            condition = Expression::join(
                condition.as_ref(),
                modification.additional_condition.as_ref(),
                AND,
            )?;
            update = UpdateExpression::merge_expressions(update, modification.update_expression);
        }

        Ok(WriteModification {
            transformed_item: item,
            additional_condition: condition,
            update_expression: update,
        })
    }

    fn after_read(&self, context: &AfterReadContext<'_>) -> EnhancedResult<ReadModification> {
        let mut item = None;
        for extension in self.extensions.iter().rev() {
            let modification = extension.after_read(&AfterReadContext {
                item: item.as_ref().unwrap_or(context.item),
                ..*context
            })?;
            if let Some(next) = modification.transformed_item {
                item = Some(next);
            }
        }
        Ok(ReadModification { transformed_item: item })
    }
}
