//! Merge record-derived, extension and caller update actions into one
//! update expression.

use std::collections::{HashMap, HashSet};

use dynamap_model::Item;

use super::update::{RemoveAction, SetAction, UpdateAction, UpdateExpression};
use crate::error::{EnhancedError, EnhancedResult};
use crate::schema::UpdateBehavior;

/// Where an update action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Record,
    Extension,
    Request,
}

impl Source {
    fn describe(self) -> &'static str {
        match self {
            Self::Record => "the record",
            Self::Extension => "an extension",
            Self::Request => "the request",
        }
    }
}

/// Inputs of one update resolution.
///
/// Record actions come first, then extension actions, then request actions.
/// A record attribute holding the null marker becomes a REMOVE unless the
/// extension or request expression touches that attribute.
#[derive(Debug, Clone, Copy)]
pub struct UpdateExpressionResolver<'a> {
    /// Item built from the record (after extensions), including null markers.
    pub item: &'a Item,
    /// Attributes that must not be written (the primary key).
    pub key_attributes: &'a [&'a str],
    /// Update expression contributed by extensions.
    pub extension: Option<&'a UpdateExpression>,
    /// Update expression supplied by the caller.
    pub request: Option<&'a UpdateExpression>,
    /// Non-default update behaviors by attribute.
    pub update_behaviors: &'a HashMap<String, UpdateBehavior>,
}

impl UpdateExpressionResolver<'_> {
    /// Produce the merged update expression, or `None` if nothing is written.
    pub fn resolve(&self) -> EnhancedResult<Option<UpdateExpression>> {
        let referenced: HashSet<String> = self
            .extension
            .into_iter()
            .chain(self.request)
            .flat_map(UpdateExpression::find_attribute_names)
            .collect();

        let mut merged = Merged::default();
        for action in self.record_actions(&referenced) {
            merged.push(Source::Record, action)?;
        }
        for action in self.extension.map(UpdateExpression::actions).unwrap_or_default() {
            merged.push(Source::Extension, action.clone())?;
        }
        for action in self.request.map(UpdateExpression::actions).unwrap_or_default() {
            merged.push(Source::Request, action.clone())?;
        }

        if merged.actions.is_empty() {
            return Ok(None);
        }
        Ok(Some(UpdateExpression::from_actions(
            merged.actions.into_iter().map(|(_, a)| a).collect(),
        )))
    }

    fn record_actions(&self, referenced: &HashSet<String>) -> Vec<UpdateAction> {
        let mut names: Vec<&String> = self
            .item
            .keys()
            .filter(|name| !self.key_attributes.contains(&name.as_str()))
            .collect();
        names.sort();

        let mut actions = Vec::with_capacity(names.len());
        for name in names {
            let value = &self.item[name];
            if value.is_null() {
                if !referenced.contains(name) {
                    actions.push(UpdateAction::Remove(RemoveAction::for_attribute(name)));
                }
                continue;
            }
            let action = match self.update_behaviors.get(name) {
                Some(UpdateBehavior::WriteIfNotExists) => SetAction::if_not_exists(name, value.clone()),
                _ => SetAction::for_attribute(name, value.clone()),
            };
            actions.push(UpdateAction::Set(action));
        }
        actions
    }
}

/// Actions accepted so far, indexed by the top-level attribute they write.
///
/// Two sources touching the same attribute conflict, whatever document
/// paths they use, unless their actions are identical. A record action and
/// a request action on the same attribute always conflict. One source may
/// write several distinct paths below the same attribute.
#[derive(Default)]
struct Merged {
    actions: Vec<(Source, UpdateAction)>,
    by_attribute: HashMap<String, Vec<usize>>,
}

impl Merged {
    fn push(&mut self, source: Source, action: UpdateAction) -> EnhancedResult<()> {
        let attribute = action.top_level_attribute();
        let path = action.resolved_path();
        let positions = self.by_attribute.entry(attribute.clone()).or_default();

        for &pos in positions.iter() {
            let (existing_source, existing) = &self.actions[pos];
            let existing_path = existing.resolved_path();
            if *existing_source == source && existing_path != path {
                continue;
            }
            let always_conflicts = *existing_source == Source::Record && source == Source::Request;
            if !always_conflicts && *existing == action {
                return Ok(());
            }
            return Err(EnhancedError::conflict(
                attribute,
                format!(
                    "{} writes '{}' with {} {}, but {} already writes '{}' with {} {}",
                    source.describe(),
                    path,
                    action.kind(),
                    action.render(),
                    existing_source.describe(),
                    existing_path,
                    existing.kind(),
                    existing.render(),
                ),
            ));
        }

        positions.push(self.actions.len());
        self.actions.push((source, action));
        Ok(())
    }
}
