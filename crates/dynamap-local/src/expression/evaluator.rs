//! Evaluation of parsed expressions against a stored item.
//!
//! An [`EvalContext`] binds an item to the request's placeholder maps. It
//! evaluates conditions to booleans, applies update expressions to a copy of
//! the item and projects attributes.

use std::cmp::Ordering;
use std::collections::HashMap;

use dynamap_model::{AttributeValue, Item};

use super::ast::{
    AddAction, AttributePath, CompareOp, DeleteAction, Expr, FunctionName, LogicalOp, Operand,
    PathElement, SetValue, UpdateExpr, resolve_name,
};
use super::parser::ExpressionError;

/// An item plus the substitutions of the request being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Current item; empty when no item is stored under the key.
    pub item: &'a Item,
    /// `#name` substitutions.
    pub names: &'a HashMap<String, String>,
    /// `:value` substitutions.
    pub values: &'a HashMap<String, AttributeValue>,
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

impl EvalContext<'_> {
    /// Evaluate a condition.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool, ExpressionError> {
        match expr {
            Expr::Compare { left, op, right } => {
                let (Some(l), Some(r)) = (self.resolve_operand(left)?, self.resolve_operand(right)?) else {
                    return Ok(false);
                };
                Ok(compare_values(&l, &r, *op))
            }
            Expr::Between { value, low, high } => {
                let (Some(v), Some(lo), Some(hi)) = (
                    self.resolve_operand(value)?,
                    self.resolve_operand(low)?,
                    self.resolve_operand(high)?,
                ) else {
                    return Ok(false);
                };
                Ok(compare_values(&v, &lo, CompareOp::Ge) && compare_values(&v, &hi, CompareOp::Le))
            }
            Expr::In { value, list } => {
                let Some(v) = self.resolve_operand(value)? else {
                    return Ok(false);
                };
                for candidate in list {
                    if self
                        .resolve_operand(candidate)?
                        .is_some_and(|c| compare_values(&v, &c, CompareOp::Eq))
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Logical { op: LogicalOp::And, left, right } => Ok(self.evaluate(left)? && self.evaluate(right)?),
            Expr::Logical { op: LogicalOp::Or, left, right } => Ok(self.evaluate(left)? || self.evaluate(right)?),
            Expr::Not(inner) => self.evaluate(inner).map(|v| !v),
            Expr::Function { name, args } => self.eval_function(*name, args),
        }
    }

    fn eval_function(&self, name: FunctionName, args: &[Operand]) -> Result<bool, ExpressionError> {
        let [first, rest @ ..] = args else {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "missing arguments".to_owned(),
            });
        };
        let Operand::Path(path) = first else {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "first argument must be an attribute path".to_owned(),
            });
        };
        let target = self.resolve_path(path)?;
        let second = match rest.first() {
            Some(operand) => self.resolve_operand(operand)?,
            None => None,
        };
        Ok(match name {
            FunctionName::AttributeExists => target.is_some(),
            FunctionName::AttributeNotExists => target.is_none(),
            FunctionName::AttributeType => {
                let Some(AttributeValue::S(expected)) = second else {
                    return Err(ExpressionError::TypeMismatch {
                        message: "attribute_type expects a string type descriptor".to_owned(),
                    });
                };
                target.is_some_and(|v| v.type_descriptor() == expected)
            }
            FunctionName::BeginsWith => match (target, second) {
                (Some(AttributeValue::S(s)), Some(AttributeValue::S(prefix))) => s.starts_with(prefix.as_str()),
                (Some(AttributeValue::B(b)), Some(AttributeValue::B(prefix))) => b.starts_with(&prefix),
                _ => false,
            },
            FunctionName::Contains => match (target, second) {
                (Some(AttributeValue::S(s)), Some(AttributeValue::S(sub))) => s.contains(sub.as_str()),
                (Some(AttributeValue::Ss(set)), Some(AttributeValue::S(v)))
                | (Some(AttributeValue::Ns(set)), Some(AttributeValue::N(v))) => set.contains(&v),
                (Some(AttributeValue::Bs(set)), Some(AttributeValue::B(v))) => set.contains(&v),
                (Some(AttributeValue::L(list)), Some(v)) => list.contains(&v),
                _ => false,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Operand resolution
// ---------------------------------------------------------------------------

impl EvalContext<'_> {
    /// Resolve an operand. `Ok(None)` means the path does not exist.
    pub fn resolve_operand(&self, operand: &Operand) -> Result<Option<AttributeValue>, ExpressionError> {
        match operand {
            Operand::Path(path) => Ok(self.resolve_path(path)?.cloned()),
            Operand::Value(name) => self
                .values
                .get(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| ExpressionError::UnresolvedValue { name: name.clone() }),
            Operand::Size(path) => Ok(self
                .resolve_path(path)?
                .and_then(attribute_size)
                .map(AttributeValue::number)),
        }
    }

    /// Walk `path` through the item.
    pub fn resolve_path(&self, path: &AttributePath) -> Result<Option<&AttributeValue>, ExpressionError> {
        let mut current: Option<&AttributeValue> = None;
        for (i, element) in path.elements.iter().enumerate() {
            current = match element {
                PathElement::Attribute(name) => {
                    let name = self.name(name)?;
                    if i == 0 {
                        self.item.get(name)
                    } else {
                        current.and_then(AttributeValue::as_m).and_then(|m| m.get(name))
                    }
                }
                PathElement::Index(idx) => current.and_then(AttributeValue::as_l).and_then(|l| l.get(*idx)),
            };
            if current.is_none() {
                return Ok(None);
            }
        }
        Ok(current)
    }

    fn name<'n>(&'n self, name: &'n str) -> Result<&'n str, ExpressionError> {
        resolve_name(name, self.names).ok_or_else(|| ExpressionError::UnresolvedName { name: name.to_owned() })
    }

    fn required(&self, operand: &Operand, operation: &str) -> Result<AttributeValue, ExpressionError> {
        self.resolve_operand(operand)?.ok_or_else(|| ExpressionError::InvalidOperand {
            operation: operation.to_owned(),
            message: "operand refers to an attribute that does not exist".to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

impl EvalContext<'_> {
    /// Apply `update` to a copy of the item.
    ///
    /// Every operand is read from the item as it was before the update, so
    /// clause order does not change the result.
    pub fn apply_update(&self, update: &UpdateExpr) -> Result<Item, ExpressionError> {
        let mut result = self.item.clone();
        for action in &update.set_actions {
            let value = self.resolve_set_value(&action.value)?;
            self.write_path(&mut result, &action.path, Some(value))?;
        }
        for path in &update.remove_paths {
            self.write_path(&mut result, path, None)?;
        }
        for action in &update.add_actions {
            self.apply_add(&mut result, action)?;
        }
        for action in &update.delete_actions {
            self.apply_delete(&mut result, action)?;
        }
        Ok(result)
    }

    fn resolve_set_value(&self, value: &SetValue) -> Result<AttributeValue, ExpressionError> {
        match value {
            SetValue::Operand(operand) => self.required(operand, "SET"),
            SetValue::Plus(a, b) => numeric_arithmetic(&self.resolve_set_value(a)?, &self.resolve_set_value(b)?, true),
            SetValue::Minus(a, b) => {
                numeric_arithmetic(&self.resolve_set_value(a)?, &self.resolve_set_value(b)?, false)
            }
            SetValue::IfNotExists(path, default) => match self.resolve_path(path)? {
                Some(existing) => Ok(existing.clone()),
                None => self.required(default, "if_not_exists"),
            },
            SetValue::ListAppend(a, b) => match (self.required(a, "list_append")?, self.required(b, "list_append")?) {
                (AttributeValue::L(mut first), AttributeValue::L(second)) => {
                    first.extend(second);
                    Ok(AttributeValue::L(first))
                }
                _ => Err(ExpressionError::TypeMismatch {
                    message: "list_append requires two lists".to_owned(),
                }),
            },
        }
    }

    fn apply_add(&self, item: &mut Item, action: &AddAction) -> Result<(), ExpressionError> {
        let value = self.required(&action.value, "ADD")?;
        let name = self.top_level(&action.path, "ADD")?;
        let merged = match (item.remove(&name), value) {
            (None, value @ (AttributeValue::N(_) | AttributeValue::Ss(_) | AttributeValue::Ns(_) | AttributeValue::Bs(_))) => value,
            (Some(existing @ AttributeValue::N(_)), value @ AttributeValue::N(_)) => numeric_arithmetic(&existing, &value, true)?,
            (Some(AttributeValue::Ss(existing)), AttributeValue::Ss(new)) => AttributeValue::Ss(set_union(existing, new)),
            (Some(AttributeValue::Ns(existing)), AttributeValue::Ns(new)) => AttributeValue::Ns(set_union(existing, new)),
            (Some(AttributeValue::Bs(existing)), AttributeValue::Bs(new)) => AttributeValue::Bs(set_union(existing, new)),
            (existing, value) => {
                return Err(ExpressionError::TypeMismatch {
                    message: format!(
                        "ADD cannot combine {} with {}",
                        existing.as_ref().map_or("nothing", AttributeValue::type_descriptor),
                        value.type_descriptor()
                    ),
                });
            }
        };
        item.insert(name, merged);
        Ok(())
    }

    fn apply_delete(&self, item: &mut Item, action: &DeleteAction) -> Result<(), ExpressionError> {
        let value = self.required(&action.value, "DELETE")?;
        let name = self.top_level(&action.path, "DELETE")?;
        let Some(existing) = item.remove(&name) else {
            return Ok(());
        };
        let remaining = match (existing, value) {
            (AttributeValue::Ss(set), AttributeValue::Ss(gone)) => non_empty(set_difference(set, &gone), AttributeValue::Ss),
            (AttributeValue::Ns(set), AttributeValue::Ns(gone)) => non_empty(set_difference(set, &gone), AttributeValue::Ns),
            (AttributeValue::Bs(set), AttributeValue::Bs(gone)) => non_empty(set_difference(set, &gone), AttributeValue::Bs),
            (existing, value) => {
                return Err(ExpressionError::TypeMismatch {
                    message: format!(
                        "DELETE cannot remove {} from {}",
                        value.type_descriptor(),
                        existing.type_descriptor()
                    ),
                });
            }
        };
        if let Some(remaining) = remaining {
            item.insert(name, remaining);
        }
        Ok(())
    }

    fn top_level(&self, path: &AttributePath, operation: &str) -> Result<String, ExpressionError> {
        if path.elements.len() != 1 {
            return Err(ExpressionError::InvalidOperand {
                operation: operation.to_owned(),
                message: format!("'{path}' must be a top-level attribute"),
            });
        }
        match &path.elements[0] {
            PathElement::Attribute(name) => Ok(self.name(name)?.to_owned()),
            PathElement::Index(_) => Err(ExpressionError::InvalidOperand {
                operation: operation.to_owned(),
                message: "path must start with an attribute name".to_owned(),
            }),
        }
    }

    /// Set (`Some`) or remove (`None`) the value at `path` inside `item`.
    fn write_path(&self, item: &mut Item, path: &AttributePath, value: Option<AttributeValue>) -> Result<(), ExpressionError> {
        let Some((PathElement::Attribute(head), rest)) = path.elements.split_first() else {
            return Err(invalid_path(path));
        };
        let head = self.name(head)?.to_owned();
        if rest.is_empty() {
            match value {
                Some(value) => item.insert(head, value),
                None => item.remove(&head),
            };
            return Ok(());
        }
        match item.get_mut(&head) {
            Some(parent) => self.write_nested(parent, rest, value, path),
            None if value.is_none() => Ok(()),
            None => Err(invalid_path(path)),
        }
    }

    fn write_nested(
        &self,
        parent: &mut AttributeValue,
        elements: &[PathElement],
        value: Option<AttributeValue>,
        path: &AttributePath,
    ) -> Result<(), ExpressionError> {
        let Some((element, rest)) = elements.split_first() else {
            return Err(invalid_path(path));
        };
        match (parent, element) {
            (AttributeValue::M(map), PathElement::Attribute(name)) => {
                let name = self.name(name)?.to_owned();
                if rest.is_empty() {
                    match value {
                        Some(value) => map.insert(name, value),
                        None => map.remove(&name),
                    };
                    return Ok(());
                }
                match map.get_mut(&name) {
                    Some(child) => self.write_nested(child, rest, value, path),
                    None if value.is_none() => Ok(()),
                    None => Err(invalid_path(path)),
                }
            }
            (AttributeValue::L(list), PathElement::Index(idx)) => {
                if rest.is_empty() {
                    match value {
                        Some(value) if *idx < list.len() => list[*idx] = value,
                        Some(value) => list.push(value),
                        None if *idx < list.len() => {
                            list.remove(*idx);
                        }
                        None => {}
                    }
                    return Ok(());
                }
                match list.get_mut(*idx) {
                    Some(child) => self.write_nested(child, rest, value, path),
                    None if value.is_none() => Ok(()),
                    None => Err(invalid_path(path)),
                }
            }
            _ if value.is_none() => Ok(()),
            _ => Err(invalid_path(path)),
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

impl EvalContext<'_> {
    /// Keep only the top-level attributes named by `paths`.
    pub fn apply_projection(&self, paths: &[AttributePath]) -> Result<Item, ExpressionError> {
        let mut projected = Item::new();
        for path in paths {
            let Some(PathElement::Attribute(head)) = path.elements.first() else {
                return Err(invalid_path(path));
            };
            let head = self.name(head)?;
            if let Some(value) = self.item.get(head) {
                projected.insert(head.to_owned(), value.clone());
            }
        }
        Ok(projected)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_path(path: &AttributePath) -> ExpressionError {
    ExpressionError::InvalidOperand {
        operation: "update".to_owned(),
        message: format!("the document path '{path}' is invalid for update"),
    }
}

/// Two numbers, exact for integers, `f64` otherwise.
enum Number {
    Int(i128),
    Float(f64),
}

fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i128>() {
        return Some(Number::Int(n));
    }
    text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Number::Float)
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(n) => *n as f64,
            Self::Float(f) => *f,
        }
    }
}

fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    match (parse_number(a)?, parse_number(b)?) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (x, y) => x.as_f64().partial_cmp(&y.as_f64()),
    }
}

fn compare_values(left: &AttributeValue, right: &AttributeValue, op: CompareOp) -> bool {
    let ordering = match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (AttributeValue::N(a), AttributeValue::N(b)) => compare_numbers(a, b),
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => None,
    };
    match (op, ordering) {
        (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
        (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
        (CompareOp::Eq, None) => left == right,
        (CompareOp::Ne, None) => left != right,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        (_, None) => false,
    }
}

fn numeric_arithmetic(a: &AttributeValue, b: &AttributeValue, add: bool) -> Result<AttributeValue, ExpressionError> {
    let (AttributeValue::N(a), AttributeValue::N(b)) = (a, b) else {
        return Err(ExpressionError::TypeMismatch {
            message: format!(
                "arithmetic requires numbers, found {} and {}",
                a.type_descriptor(),
                b.type_descriptor()
            ),
        });
    };
    let (Some(x), Some(y)) = (parse_number(a), parse_number(b)) else {
        return Err(ExpressionError::TypeMismatch {
            message: format!("'{a}' or '{b}' is not a valid number"),
        });
    };
    let result = match (x, y) {
        (Number::Int(x), Number::Int(y)) => {
            let sum = if add { x.checked_add(y) } else { x.checked_sub(y) };
            match sum {
                Some(n) => return Ok(AttributeValue::number(n)),
                None => Number::Int(x).as_f64() + if add { Number::Int(y).as_f64() } else { -Number::Int(y).as_f64() },
            }
        }
        (x, y) => {
            if add {
                x.as_f64() + y.as_f64()
            } else {
                x.as_f64() - y.as_f64()
            }
        }
    };
    Ok(AttributeValue::number(result))
}

fn attribute_size(value: &AttributeValue) -> Option<usize> {
    Some(match value {
        AttributeValue::S(s) => s.len(),
        AttributeValue::B(b) => b.len(),
        AttributeValue::Ss(v) | AttributeValue::Ns(v) => v.len(),
        AttributeValue::Bs(v) => v.len(),
        AttributeValue::L(v) => v.len(),
        AttributeValue::M(m) => m.len(),
        AttributeValue::N(_) | AttributeValue::Bool(_) | AttributeValue::Null(_) => return None,
    })
}

fn set_union<T: PartialEq>(mut existing: Vec<T>, new: Vec<T>) -> Vec<T> {
    for element in new {
        if !existing.contains(&element) {
            existing.push(element);
        }
    }
    existing
}

fn set_difference<T: PartialEq>(set: Vec<T>, gone: &[T]) -> Vec<T> {
    set.into_iter().filter(|e| !gone.contains(e)).collect()
}

fn non_empty<T>(set: Vec<T>, wrap: fn(Vec<T>) -> AttributeValue) -> Option<AttributeValue> {
    (!set.is_empty()).then(|| wrap(set))
}
