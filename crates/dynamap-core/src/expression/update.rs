//! Structured update expressions.
//!
//! An [`UpdateExpression`] is a list of actions, each carrying its own
//! placeholder maps. Actions are rendered grouped by kind:
//! `SET a = :a, b = :b REMOVE x, y DELETE p :v ADD q :v`.

use std::collections::HashMap;
use std::fmt;

use dynamap_model::AttributeValue;

use super::fragment::{Expression, join_names, join_values, validate_placeholders};
use super::placeholder::{key_ref, value_ref};
use crate::error::EnhancedResult;

/// Kind of an update action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateActionKind {
    /// `SET path = value`
    Set,
    /// `REMOVE path`
    Remove,
    /// `DELETE path value`
    Delete,
    /// `ADD path value`
    Add,
}

impl UpdateActionKind {
    /// Clause keyword.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Remove => "REMOVE",
            Self::Delete => "DELETE",
            Self::Add => "ADD",
        }
    }
}

impl fmt::Display for UpdateActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// `SET path = value`. The value may be an operand expression such as
/// `if_not_exists(#a, :a) + :d`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetAction {
    /// Target path, usually a `#name` token.
    pub path: String,
    /// Value expression.
    pub value: String,
    /// Name placeholders used by path and value.
    pub expression_names: HashMap<String, String>,
    /// Value placeholders used by the value.
    pub expression_values: HashMap<String, AttributeValue>,
}

impl SetAction {
    /// `SET #attr = :attr` for a top-level attribute.
    #[must_use]
    pub fn for_attribute(name: &str, value: AttributeValue) -> Self {
        let (key, val) = (key_ref(name), value_ref(name));
        Self {
            path: key.clone(),
            value: val.clone(),
            expression_names: HashMap::from([(key, name.to_owned())]),
            expression_values: HashMap::from([(val, value)]),
        }
    }

    /// `SET #attr = if_not_exists(#attr, :attr)` for a top-level attribute.
    #[must_use]
    pub fn if_not_exists(name: &str, value: AttributeValue) -> Self {
        let mut action = Self::for_attribute(name, value);
        action.value = format!("if_not_exists({}, {})", action.path, action.value);
        action
    }
}

/// `REMOVE path`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoveAction {
    /// Target path.
    pub path: String,
    /// Name placeholders used by the path.
    pub expression_names: HashMap<String, String>,
}

impl RemoveAction {
    /// `REMOVE #attr` for a top-level attribute.
    #[must_use]
    pub fn for_attribute(name: &str) -> Self {
        let key = key_ref(name);
        Self {
            path: key.clone(),
            expression_names: HashMap::from([(key, name.to_owned())]),
        }
    }
}

/// `DELETE path value` (remove elements from a set).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteAction {
    /// Target path.
    pub path: String,
    /// Value token of the elements to remove.
    pub value: String,
    /// Name placeholders used by the path.
    pub expression_names: HashMap<String, String>,
    /// Value placeholders used by the value.
    pub expression_values: HashMap<String, AttributeValue>,
}

/// `ADD path value` (increment a number or add set elements).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddAction {
    /// Target path.
    pub path: String,
    /// Value token of the increment or elements.
    pub value: String,
    /// Name placeholders used by the path.
    pub expression_names: HashMap<String, String>,
    /// Value placeholders used by the value.
    pub expression_values: HashMap<String, AttributeValue>,
}

/// One action of an update expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// SET
    Set(SetAction),
    /// REMOVE
    Remove(RemoveAction),
    /// DELETE
    Delete(DeleteAction),
    /// ADD
    Add(AddAction),
}

impl UpdateAction {
    /// Kind of this action.
    #[must_use]
    pub fn kind(&self) -> UpdateActionKind {
        match self {
            Self::Set(_) => UpdateActionKind::Set,
            Self::Remove(_) => UpdateActionKind::Remove,
            Self::Delete(_) => UpdateActionKind::Delete,
            Self::Add(_) => UpdateActionKind::Add,
        }
    }

    /// Target path as written (with tokens).
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Set(a) => &a.path,
            Self::Remove(a) => &a.path,
            Self::Delete(a) => &a.path,
            Self::Add(a) => &a.path,
        }
    }

    /// Name placeholders.
    #[must_use]
    pub fn names(&self) -> &HashMap<String, String> {
        match self {
            Self::Set(a) => &a.expression_names,
            Self::Remove(a) => &a.expression_names,
            Self::Delete(a) => &a.expression_names,
            Self::Add(a) => &a.expression_names,
        }
    }

    /// Value placeholders. Empty for REMOVE.
    #[must_use]
    pub fn values(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::Set(a) => Some(&a.expression_values),
            Self::Remove(_) => None,
            Self::Delete(a) => Some(&a.expression_values),
            Self::Add(a) => Some(&a.expression_values),
        }
    }

    /// The clause body without its keyword (`#a = :a`, `#b`, `#s :v`).
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Set(a) => format!("{} = {}", a.path, a.value),
            Self::Remove(a) => a.path.clone(),
            Self::Delete(a) => format!("{} {}", a.path, a.value),
            Self::Add(a) => format!("{} {}", a.path, a.value),
        }
    }

    /// Target path with name tokens substituted (`address.city[0]`).
    #[must_use]
    pub fn resolved_path(&self) -> String {
        resolve_path(self.path(), self.names())
    }

    /// Top-level attribute the action writes.
    #[must_use]
    pub fn top_level_attribute(&self) -> String {
        top_level(&self.resolved_path()).to_owned()
    }

    /// Check that the action declares every placeholder it uses.
    pub fn validate(&self) -> EnhancedResult<()> {
        let empty = HashMap::new();
        validate_placeholders(&self.render(), self.names(), self.values().unwrap_or(&empty))
    }
}

fn resolve_path(path: &str, names: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(start) = rest.find('#') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .map_or(tail.len(), |i| i + 1);
        let token = &tail[..end];
        out.push_str(names.get(token).map_or(token, String::as_str));
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

fn top_level(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    &path[..end]
}

/// An ordered collection of update actions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateExpression {
    actions: Vec<UpdateAction>,
}

impl UpdateExpression {
    /// An empty update expression.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of actions.
    #[must_use]
    pub fn from_actions(actions: Vec<UpdateAction>) -> Self {
        Self { actions }
    }

    /// Append an action.
    pub fn add_action(&mut self, action: UpdateAction) {
        self.actions.push(action);
    }

    /// Builder-style [`add_action`](Self::add_action).
    #[must_use]
    pub fn with_action(mut self, action: UpdateAction) -> Self {
        self.actions.push(action);
        self
    }

    /// All actions in insertion order.
    #[must_use]
    pub fn actions(&self) -> &[UpdateAction] {
        &self.actions
    }

    /// Actions of one kind, in insertion order.
    pub fn actions_of(&self, kind: UpdateActionKind) -> impl Iterator<Item = &UpdateAction> {
        self.actions.iter().filter(move |a| a.kind() == kind)
    }

    /// Returns `true` if there are no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Concatenate two optional update expressions.
    #[must_use]
    pub fn merge_expressions(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        match (first, second) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only),
            (Some(mut a), Some(b)) => {
                a.actions.extend(b.actions);
                Some(a)
            }
        }
    }

    /// Top-level attribute names written by any action, in order, without
    /// duplicates.
    #[must_use]
    pub fn find_attribute_names(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for action in &self.actions {
            let name = action.top_level_attribute();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// Check every action's placeholders.
    pub fn validate(&self) -> EnhancedResult<()> {
        self.actions.iter().try_for_each(UpdateAction::validate)
    }

    /// Render into wire text with merged placeholder maps. Returns `None`
    /// when there are no actions.
    pub fn to_expression(&self) -> EnhancedResult<Option<Expression>> {
        if self.actions.is_empty() {
            return Ok(None);
        }

        let mut clauses = Vec::new();
        for kind in [
            UpdateActionKind::Set,
            UpdateActionKind::Remove,
            UpdateActionKind::Delete,
            UpdateActionKind::Add,
        ] {
            let bodies: Vec<String> = self.actions_of(kind).map(UpdateAction::render).collect();
            if !bodies.is_empty() {
                clauses.push(format!("{kind} {}", bodies.join(", ")));
            }
        }

        let mut names = HashMap::new();
        let mut values = HashMap::new();
        for action in &self.actions {
            names = join_names(&names, action.names())?;
            if let Some(v) = action.values() {
                values = join_values(&values, v)?;
            }
        }

        Ok(Some(
            Expression::builder()
                .expression(clauses.join(" "))
                .names(names)
                .values(values)
                .build(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_tag(tag: &str) -> UpdateAction {
        UpdateAction::Delete(DeleteAction {
            path: "#tags".to_owned(),
            value: ":gone".to_owned(),
            expression_names: HashMap::from([("#tags".to_owned(), "tags".to_owned())]),
            expression_values: HashMap::from([(":gone".to_owned(), AttributeValue::Ss(vec![tag.to_owned()]))]),
        })
    }

    fn add_visits() -> UpdateAction {
        UpdateAction::Add(AddAction {
            path: "#visits".to_owned(),
            value: ":one".to_owned(),
            expression_names: HashMap::from([("#visits".to_owned(), "visits".to_owned())]),
            expression_values: HashMap::from([(":one".to_owned(), AttributeValue::number(1))]),
        })
    }

    #[test]
    fn test_should_render_clauses_grouped_by_kind() {
        let expr = UpdateExpression::new()
            .with_action(add_visits())
            .with_action(UpdateAction::Remove(RemoveAction::for_attribute("x")))
            .with_action(UpdateAction::Set(SetAction::for_attribute("a", AttributeValue::from("1"))))
            .with_action(delete_tag("old"))
            .with_action(UpdateAction::Remove(RemoveAction::for_attribute("y")))
            .with_action(UpdateAction::Set(SetAction::for_attribute("b", AttributeValue::from("2"))));
        let rendered = expr.to_expression().expect("render").expect("some");
        assert_eq!(
            rendered.expression(),
            "SET #AMZN_MAPPED_a = :AMZN_MAPPED_a, #AMZN_MAPPED_b = :AMZN_MAPPED_b \
             REMOVE #AMZN_MAPPED_x, #AMZN_MAPPED_y DELETE #tags :gone ADD #visits :one"
        );
        assert_eq!(rendered.names().len(), 6);
        assert_eq!(rendered.values().len(), 4);
        assert!(rendered.validate().is_ok());
    }

    #[test]
    fn test_should_render_if_not_exists() {
        let action = SetAction::if_not_exists("created", AttributeValue::from("now"));
        assert_eq!(
            UpdateAction::Set(action).render(),
            "#AMZN_MAPPED_created = if_not_exists(#AMZN_MAPPED_created, :AMZN_MAPPED_created)"
        );
    }

    #[test]
    fn test_should_find_top_level_attribute_names() {
        let nested = UpdateAction::Set(SetAction {
            path: "#addr.#city".to_owned(),
            value: ":c".to_owned(),
            expression_names: HashMap::from([
                ("#addr".to_owned(), "address".to_owned()),
                ("#city".to_owned(), "city".to_owned()),
            ]),
            expression_values: HashMap::from([(":c".to_owned(), AttributeValue::from("Oslo"))]),
        });
        let indexed = UpdateAction::Remove(RemoveAction {
            path: "#l[2]".to_owned(),
            expression_names: HashMap::from([("#l".to_owned(), "items".to_owned())]),
        });
        assert_eq!(nested.resolved_path(), "address.city");
        let expr = UpdateExpression::from_actions(vec![nested, indexed, add_visits(), add_visits()]);
        assert_eq!(expr.find_attribute_names(), vec!["address", "items", "visits"]);
    }

    #[test]
    fn test_should_conflict_on_shared_token_with_different_values() {
        let expr = UpdateExpression::from_actions(vec![delete_tag("a"), delete_tag("b")]);
        assert!(expr.to_expression().is_err());
    }

    #[test]
    fn test_should_merge_optional_expressions() {
        let a = UpdateExpression::new().with_action(add_visits());
        let b = UpdateExpression::new().with_action(delete_tag("x"));
        let merged = UpdateExpression::merge_expressions(Some(a.clone()), Some(b)).expect("some");
        assert_eq!(merged.actions().len(), 2);
        assert_eq!(UpdateExpression::merge_expressions(Some(a.clone()), None), Some(a));
        assert_eq!(UpdateExpression::merge_expressions(None, None), None);
        assert!(UpdateExpression::new().to_expression().expect("render").is_none());
    }

    #[test]
    fn test_should_validate_action_placeholders() {
        let bad = UpdateAction::Add(AddAction {
            path: "#n".to_owned(),
            value: ":d".to_owned(),
            expression_names: HashMap::from([("#n".to_owned(), "n".to_owned())]),
            expression_values: HashMap::new(),
        });
        assert!(bad.validate().is_err());
        assert!(add_visits().validate().is_ok());
    }
}
