//! Expiry attributes derived from a base field.

use chrono::Duration;
use dynamap_model::AttributeValue;

use super::{BeforeWriteContext, Extension, WriteModification};
use crate::converter::DateTimeConverter;
use crate::error::{EnhancedError, EnhancedResult};

/// `attribute = base_attribute + duration`, stored as epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeToLive {
    /// Attribute receiving the expiry (epoch seconds).
    pub attribute: String,
    /// Attribute holding the base instant: `N` epoch seconds or `S` ISO-8601.
    pub base_attribute: String,
    /// Offset added to the base instant.
    pub duration: Duration,
}

impl TimeToLive {
    /// Describe one expiry attribute.
    #[must_use]
    pub fn new(attribute: impl Into<String>, base_attribute: impl Into<String>, duration: Duration) -> Self {
        Self {
            attribute: attribute.into(),
            base_attribute: base_attribute.into(),
            duration,
        }
    }

    fn base_seconds(&self, value: &AttributeValue) -> EnhancedResult<i64> {
        match value {
            AttributeValue::N(text) => text.trim().parse::<i64>().map_err(|_| {
                EnhancedError::Extension(anyhow::anyhow!(
                    "ttl base '{}' holds '{text}', which is not whole epoch seconds",
                    self.base_attribute
                ))
            }),
            AttributeValue::S(text) => DateTimeConverter::parse(text)
                .map(|instant| instant.timestamp())
                .map_err(|e| {
                    EnhancedError::Extension(anyhow::anyhow!("ttl base '{}': {e}", self.base_attribute))
                }),
            other => Err(EnhancedError::Extension(anyhow::anyhow!(
                "ttl base '{}' must be N or S, found {}",
                self.base_attribute,
                other.type_descriptor()
            ))),
        }
    }
}

/// Fills expiry attributes on write. An expiry already present on the item
/// is kept; an item without the base attribute gets no expiry.
#[derive(Debug, Clone, Default)]
pub struct TimeToLiveExtension {
    entries: Vec<TimeToLive>,
}

impl TimeToLiveExtension {
    /// Maintain `entries`.
    #[must_use]
    pub fn new(entries: Vec<TimeToLive>) -> Self {
        Self { entries }
    }
}

impl Extension for TimeToLiveExtension {
    fn before_write(&self, context: &BeforeWriteContext<'_>) -> EnhancedResult<WriteModification> {
        let mut item = None;
        for entry in &self.entries {
            let current = item.as_ref().unwrap_or(context.item);
            if current.get(&entry.attribute).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let Some(base) = current.get(&entry.base_attribute).filter(|v| !v.is_null()) else {
                continue;
            };
            let expires = entry.base_seconds(base)? + entry.duration.num_seconds();
            tracing::debug!(attribute = %entry.attribute, expires, "computed ttl");
            item.get_or_insert_with(|| context.item.clone())
                .insert(entry.attribute.clone(), AttributeValue::number(expires));
        }
        Ok(WriteModification {
            transformed_item: item,
            ..WriteModification::default()
        })
    }
}
