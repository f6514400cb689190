//! Condition, update and projection expressions.

mod ast;
mod evaluator;
mod parser;

pub use ast::{
    AddAction, AttributePath, CompareOp, DeleteAction, Expr, FunctionName, LogicalOp, Operand,
    PathElement, SetAction, SetValue, UpdateExpr,
};
pub use evaluator::EvalContext;
pub use parser::{ExpressionError, parse_condition, parse_projection, parse_update};
