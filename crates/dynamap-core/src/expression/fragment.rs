//! Condition and filter fragments with their own placeholder maps.

use std::collections::HashMap;

use dynamap_model::AttributeValue;

use super::placeholder::{PlaceholderToken, placeholder_tokens};
use crate::error::{EnhancedError, EnhancedResult};

/// Delimiter used to AND-join fragments.
pub const AND: &str = " AND ";

/// Delimiter used to OR-join fragments.
pub const OR: &str = " OR ";

/// Expression text plus the name and value placeholders it uses.
///
/// # Examples
///
/// ```
/// use dynamap_core::expression::Expression;
/// use dynamap_model::AttributeValue;
///
/// let a = Expression::builder()
///     .expression("#s = :s")
///     .put_name("#s", "status")
///     .put_value(":s", AttributeValue::from("OPEN"))
///     .build();
/// let b = Expression::builder()
///     .expression("attribute_exists(#s)")
///     .put_name("#s", "status")
///     .build();
/// let joined = a.and(&b).unwrap();
/// assert_eq!(joined.expression(), "(#s = :s) AND (attribute_exists(#s))");
/// assert_eq!(joined.names().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    expression: String,
    expression_names: HashMap<String, String>,
    expression_values: HashMap<String, AttributeValue>,
}

/// Builder for [`Expression`].
#[derive(Debug, Clone, Default)]
pub struct ExpressionBuilder {
    inner: Expression,
}

impl ExpressionBuilder {
    /// Set the expression text.
    #[must_use]
    pub fn expression(mut self, text: impl Into<String>) -> Self {
        self.inner.expression = text.into();
        self
    }

    /// Declare a name placeholder.
    #[must_use]
    pub fn put_name(mut self, token: impl Into<String>, name: impl Into<String>) -> Self {
        self.inner.expression_names.insert(token.into(), name.into());
        self
    }

    /// Declare a value placeholder.
    #[must_use]
    pub fn put_value(mut self, token: impl Into<String>, value: AttributeValue) -> Self {
        self.inner.expression_values.insert(token.into(), value);
        self
    }

    /// Replace all name placeholders.
    #[must_use]
    pub fn names(mut self, names: HashMap<String, String>) -> Self {
        self.inner.expression_names = names;
        self
    }

    /// Replace all value placeholders.
    #[must_use]
    pub fn values(mut self, values: HashMap<String, AttributeValue>) -> Self {
        self.inner.expression_values = values;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Expression {
        self.inner
    }
}

impl Expression {
    /// Start building an expression.
    #[must_use]
    pub fn builder() -> ExpressionBuilder {
        ExpressionBuilder::default()
    }

    /// An expression with no placeholders.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self::builder().expression(text).build()
    }

    /// Expression text.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Name placeholders.
    #[must_use]
    pub fn names(&self) -> &HashMap<String, String> {
        &self.expression_names
    }

    /// Value placeholders.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, AttributeValue> {
        &self.expression_values
    }

    /// Split into text, names and values.
    #[must_use]
    pub fn into_parts(self) -> (String, HashMap<String, String>, HashMap<String, AttributeValue>) {
        (self.expression, self.expression_names, self.expression_values)
    }

    /// Check that every placeholder in the text is declared by this fragment.
    pub fn validate(&self) -> EnhancedResult<()> {
        validate_placeholders(&self.expression, &self.expression_names, &self.expression_values)
    }

    /// AND-join with another fragment.
    pub fn and(&self, other: &Self) -> EnhancedResult<Self> {
        Self::join_pair(self, other, AND)
    }

    /// OR-join with another fragment.
    pub fn or(&self, other: &Self) -> EnhancedResult<Self> {
        Self::join_pair(self, other, OR)
    }

    /// Join two optional fragments. A missing side yields the other unchanged;
    /// otherwise both texts are parenthesized around `delimiter` and the
    /// placeholder maps are merged.
    pub fn join(
        first: Option<&Self>,
        second: Option<&Self>,
        delimiter: &str,
    ) -> EnhancedResult<Option<Self>> {
        match (first, second) {
            (None, None) => Ok(None),
            (Some(only), None) | (None, Some(only)) => Ok(Some(only.clone())),
            (Some(a), Some(b)) => Self::join_pair(a, b, delimiter).map(Some),
        }
    }

    /// Join any number of fragments left to right.
    pub fn join_all<'a>(
        fragments: impl IntoIterator<Item = &'a Self>,
        delimiter: &str,
    ) -> EnhancedResult<Option<Self>> {
        fragments
            .into_iter()
            .try_fold(None, |acc: Option<Self>, next| Self::join(acc.as_ref(), Some(next), delimiter))
    }

    fn join_pair(a: &Self, b: &Self, delimiter: &str) -> EnhancedResult<Self> {
        Ok(Self {
            expression: join_text(&a.expression, &b.expression, delimiter),
            expression_names: join_names(&a.expression_names, &b.expression_names)?,
            expression_values: join_values(&a.expression_values, &b.expression_values)?,
        })
    }
}

fn join_text(a: &str, b: &str, delimiter: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_owned(),
        (_, true) => a.to_owned(),
        _ => format!("({a}){delimiter}({b})"),
    }
}

/// Union two name maps. A token mapped to two different names is a conflict.
pub fn join_names(
    first: &HashMap<String, String>,
    second: &HashMap<String, String>,
) -> EnhancedResult<HashMap<String, String>> {
    join_maps(first, second, |token, a, b| {
        EnhancedError::conflict(
            token,
            format!("name token '{token}' maps to both '{a}' and '{b}'"),
        )
    })
}

/// Union two value maps. A token bound to two different values is a conflict.
pub fn join_values(
    first: &HashMap<String, AttributeValue>,
    second: &HashMap<String, AttributeValue>,
) -> EnhancedResult<HashMap<String, AttributeValue>> {
    join_maps(first, second, |token, a, b| {
        EnhancedError::conflict(
            token,
            format!("value token '{token}' is bound to both {a} and {b}"),
        )
    })
}

fn join_maps<V: Clone + PartialEq>(
    first: &HashMap<String, V>,
    second: &HashMap<String, V>,
    conflict: impl Fn(&str, &V, &V) -> EnhancedError,
) -> EnhancedResult<HashMap<String, V>> {
    let mut out = first.clone();
    for (token, value) in second {
        match out.get(token) {
            Some(existing) if existing != value => return Err(conflict(token, existing, value)),
            Some(_) => {}
            None => {
                out.insert(token.clone(), value.clone());
            }
        }
    }
    Ok(out)
}

/// Check that `text` declares every placeholder it uses.
pub(crate) fn validate_placeholders(
    text: &str,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> EnhancedResult<()> {
    for token in placeholder_tokens(text) {
        let declared = match token {
            PlaceholderToken::Name(t) => names.contains_key(t),
            PlaceholderToken::Value(t) => values.contains_key(t),
        };
        if !declared {
            return Err(EnhancedError::InvalidPlaceholder {
                placeholder: token.as_str().to_owned(),
                expression: text.to_owned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq_fragment(name: &str, token: &str, value: &str) -> Expression {
        Expression::builder()
            .expression(format!("#{token} = :{token}"))
            .put_name(format!("#{token}"), name)
            .put_value(format!(":{token}"), AttributeValue::from(value))
            .build()
    }

    #[test]
    fn test_should_join_with_parentheses() {
        let a = Expression::new("a");
        let b = Expression::new("b");
        let c = Expression::new("c");
        let ab = Expression::join(Some(&a), Some(&b), AND).expect("join").expect("some");
        assert_eq!(ab.expression(), "(a) AND (b)");
        let abc = Expression::join(Some(&ab), Some(&c), AND).expect("join").expect("some");
        assert_eq!(abc.expression(), "((a) AND (b)) AND (c)");
        let all = Expression::join_all([&a, &b, &c], AND).expect("join").expect("some");
        assert_eq!(all, abc);
    }

    #[test]
    fn test_should_pass_through_single_side() {
        let a = Expression::new("a");
        assert_eq!(Expression::join(Some(&a), None, AND).expect("join"), Some(a.clone()));
        assert_eq!(Expression::join(None, None, AND).expect("join"), None);
        assert_eq!(a.or(&Expression::new("b")).expect("or").expression(), "(a) OR (b)");
    }

    #[test]
    fn test_should_coalesce_identical_tokens() {
        let a = eq_fragment("status", "s", "OPEN");
        let b = eq_fragment("status", "s", "OPEN");
        let joined = a.and(&b).expect("identical tokens coalesce");
        assert_eq!(joined.names().len(), 1);
        assert_eq!(joined.values().len(), 1);
    }

    #[test]
    fn test_should_conflict_on_differing_value() {
        let a = eq_fragment("status", "s", "OPEN");
        let b = eq_fragment("status", "s", "CLOSED");
        let err = a.and(&b).expect_err("conflict");
        assert!(matches!(err, EnhancedError::ExpressionConflict { ref token, .. } if token == ":s"));
    }

    #[test]
    fn test_should_conflict_on_differing_name() {
        let a = eq_fragment("status", "s", "OPEN");
        let b = eq_fragment("state", "s", "OPEN");
        let err = a.and(&b).expect_err("conflict");
        assert!(matches!(err, EnhancedError::ExpressionConflict { ref token, .. } if token == "#s"));
    }

    #[test]
    fn test_should_reject_undeclared_placeholder() {
        let bad = Expression::builder()
            .expression("#a = :missing")
            .put_name("#a", "a")
            .build();
        let err = bad.validate().expect_err("undeclared");
        assert!(matches!(
            err,
            EnhancedError::InvalidPlaceholder { ref placeholder, .. } if placeholder == ":missing"
        ));
        assert!(eq_fragment("a", "a", "x").validate().is_ok());
    }
}
