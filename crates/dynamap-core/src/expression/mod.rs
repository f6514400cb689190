//! Expression fragments and their composition.
//!
//! Condition fragments ([`Expression`]) are joined with parenthesized
//! `AND`/`OR`. Update expressions ([`UpdateExpression`]) are lists of
//! actions merged by [`UpdateExpressionResolver`]. Placeholder maps from every
//! contributor are unioned: identical tokens with identical bindings collapse,
//! differing bindings are an [`ExpressionConflict`].
//!
//! [`ExpressionConflict`]: crate::error::EnhancedError::ExpressionConflict

pub mod fragment;
pub mod placeholder;
pub mod resolver;
pub mod update;

pub use fragment::{AND, Expression, ExpressionBuilder, OR, join_names, join_values};
pub use placeholder::{key_ref, value_ref};
pub use resolver::UpdateExpressionResolver;
pub use update::{
    AddAction, DeleteAction, RemoveAction, SetAction, UpdateAction, UpdateActionKind,
    UpdateExpression,
};
