//! Syntax tree for condition and update expressions.
//!
//! Produced by the parser and consumed by [`EvalContext`](super::EvalContext).
//! Placeholders are kept verbatim (`#name`, `:value`) and resolved at
//! evaluation time against the request's substitution maps.

use std::collections::HashMap;
use std::fmt;

/// Condition expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `left op right`.
    Compare {
        /// Left-hand operand.
        left: Operand,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// `value BETWEEN low AND high`, inclusive on both ends.
    Between {
        /// Value to test.
        value: Operand,
        /// Lower bound.
        low: Operand,
        /// Upper bound.
        high: Operand,
    },
    /// `value IN (a, b, ...)`.
    In {
        /// Value to search for.
        value: Operand,
        /// Candidates.
        list: Vec<Operand>,
    },
    /// `left AND right` / `left OR right`.
    Logical {
        /// Operator.
        op: LogicalOp,
        /// Left-hand side.
        left: Box<Expr>,
        /// Right-hand side.
        right: Box<Expr>,
    },
    /// `NOT expr`.
    Not(Box<Expr>),
    /// Boolean function call such as `attribute_exists(#a)`.
    Function {
        /// Function.
        name: FunctionName,
        /// Arguments in call order.
        args: Vec<Operand>,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `AND`
    And,
    /// `OR`
    Or,
}

/// Boolean functions usable as a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)`
    AttributeExists,
    /// `attribute_not_exists(path)`
    AttributeNotExists,
    /// `attribute_type(path, :type)`
    AttributeType,
    /// `begins_with(path, :prefix)`
    BeginsWith,
    /// `contains(path, :operand)`
    Contains,
}

impl FunctionName {
    /// Number of arguments the function takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists => 1,
            Self::AttributeType | Self::BeginsWith | Self::Contains => 2,
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::AttributeType => "attribute_type",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
        })
    }
}

/// A value producer.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Document path, e.g. `#a.b[0]`.
    Path(AttributePath),
    /// Value placeholder including its `:` prefix.
    Value(String),
    /// `size(path)`.
    Size(AttributePath),
}

/// A document path.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    /// Elements in order; the first is always an attribute.
    pub elements: Vec<PathElement>,
}

impl AttributePath {
    /// Resolve the top-level attribute name through `names`.
    #[must_use]
    pub fn top_level_name<'a>(&'a self, names: &'a HashMap<String, String>) -> Option<&'a str> {
        match self.elements.first()? {
            PathElement::Attribute(name) => resolve_name(name, names),
            PathElement::Index(_) => None,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            match element {
                PathElement::Attribute(name) if i == 0 => write!(f, "{name}")?,
                PathElement::Attribute(name) => write!(f, ".{name}")?,
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// One step of a document path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    /// Map key or `#placeholder`.
    Attribute(String),
    /// List index.
    Index(usize),
}

/// Resolve a path element name, substituting `#placeholders`.
#[must_use]
pub fn resolve_name<'a>(name: &'a str, names: &'a HashMap<String, String>) -> Option<&'a str> {
    if name.starts_with('#') {
        names.get(name).map(String::as_str)
    } else {
        Some(name)
    }
}

/// Parsed update expression, one list per clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    /// `SET path = value`
    pub set_actions: Vec<SetAction>,
    /// `REMOVE path`
    pub remove_paths: Vec<AttributePath>,
    /// `ADD path value`
    pub add_actions: Vec<AddAction>,
    /// `DELETE path value`
    pub delete_actions: Vec<DeleteAction>,
}

impl UpdateExpr {
    /// Returns `true` if the update only removes data.
    #[must_use]
    pub fn is_subtractive(&self) -> bool {
        self.set_actions.is_empty() && self.add_actions.is_empty()
    }

    /// Every path the update writes or removes, in clause order.
    pub fn target_paths(&self) -> impl Iterator<Item = &AttributePath> {
        self.set_actions
            .iter()
            .map(|a| &a.path)
            .chain(self.remove_paths.iter())
            .chain(self.add_actions.iter().map(|a| &a.path))
            .chain(self.delete_actions.iter().map(|a| &a.path))
    }
}

/// `path = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAction {
    /// Target.
    pub path: AttributePath,
    /// Right-hand side.
    pub value: SetValue,
}

/// Right-hand side of a SET action.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Plain operand.
    Operand(Operand),
    /// `a + b`
    Plus(Box<SetValue>, Box<SetValue>),
    /// `a - b`
    Minus(Box<SetValue>, Box<SetValue>),
    /// `if_not_exists(path, default)`
    IfNotExists(AttributePath, Operand),
    /// `list_append(a, b)`
    ListAppend(Operand, Operand),
}

/// `path value` in an ADD clause.
#[derive(Debug, Clone, PartialEq)]
pub struct AddAction {
    /// Target.
    pub path: AttributePath,
    /// Number or set to add.
    pub value: Operand,
}

/// `path value` in a DELETE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteAction {
    /// Target set.
    pub path: AttributePath,
    /// Elements to remove.
    pub value: Operand,
}
