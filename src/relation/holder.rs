//! Pending identifier registry.
//!
//! The [`IdentifierHolder`] collects, per entity class, the identifiers of
//! entities that still need loading. Each class keeps one of two shapes:
//!
//! - **Fields**: single-field identifiers grouped by field name. Flushed as
//!   `field IN (...)`, or as one-field groups when several fields are pending.
//! - **Composite**: whole identifiers keyed by their joined values. Flushed as
//!   an OR of AND-ed groups.
//!
//! A class starts in whichever shape its first identifier dictates. Registering a
//! multi-field identifier for a class held as `Fields` promotes the class to
//! `Composite`, turning every single-field entry into a one-field group.

use crate::metadata::identity::value_key;
use crate::metadata::IdentifierValues;
use crate::query::Criteria;
use indexmap::IndexMap;
use sea_query::Value;
use std::collections::HashSet;

/// Identifiers registered for one entity class
#[derive(Debug, Clone, PartialEq)]
pub enum PendingIdentifierSet {
    /// field name → values, in registration order; duplicates are kept until flush
    Fields(IndexMap<String, Vec<Value>>),
    /// joined identifier key → identifier
    Composite(IndexMap<String, IdentifierValues>),
}

impl PendingIdentifierSet {
    fn from_identifier(identifier: IdentifierValues) -> Self {
        let mut set = if identifier.len() > 1 {
            Self::Composite(IndexMap::new())
        } else {
            Self::Fields(IndexMap::new())
        };
        set.push(identifier);
        set
    }

    fn push(&mut self, identifier: IdentifierValues) {
        if identifier.len() > 1 {
            self.promote();
        }
        match self {
            Self::Fields(fields) => {
                for (field, value) in identifier.iter() {
                    fields
                        .entry(field.to_string())
                        .or_default()
                        .push(value.clone());
                }
            }
            Self::Composite(groups) => {
                groups.insert(identifier.key(), identifier);
            }
        }
    }

    fn promote(&mut self) {
        if let Self::Fields(fields) = self {
            let mut groups = IndexMap::new();
            for (field, values) in fields.iter() {
                for value in values {
                    let identifier = IdentifierValues::single(field.clone(), value.clone());
                    groups.insert(identifier.key(), identifier);
                }
            }
            *self = Self::Composite(groups);
        }
    }

    /// Number of registered entries, duplicates included
    pub fn len(&self) -> usize {
        match self {
            Self::Fields(fields) => fields.values().map(Vec::len).sum(),
            Self::Composite(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Criteria for the batched fetch of this set, `None` when nothing is pending
    ///
    /// A single field becomes `field IN (...)`. Several fields, or a composite
    /// set, become one AND-ed group per distinct identifier. Duplicates are
    /// dropped, keeping the first occurrence.
    pub fn to_criteria(&self) -> Option<Criteria> {
        match self {
            Self::Fields(fields) => {
                let mut populated = fields.iter().filter(|(_, values)| !values.is_empty());
                let (field, values) = populated.next()?;
                let mut seen = HashSet::new();
                if populated.next().is_none() {
                    let values = values
                        .iter()
                        .filter(|value| seen.insert(value_key(value)))
                        .cloned()
                        .collect();
                    return Some(Criteria::In {
                        field: field.clone(),
                        values,
                    });
                }

                let mut groups = Vec::new();
                for (field, values) in fields {
                    for value in values {
                        let group = IdentifierValues::single(field.clone(), value.clone());
                        // `{field: value}` is unique per pair
                        if seen.insert(group.to_string()) {
                            groups.push(group);
                        }
                    }
                }
                Some(Criteria::AnyOf(groups))
            }
            Self::Composite(groups) if groups.is_empty() => None,
            Self::Composite(groups) => Some(Criteria::AnyOf(groups.values().cloned().collect())),
        }
    }
}

/// Per-class registry of identifiers awaiting a batched load
#[derive(Debug, Clone, Default)]
pub struct IdentifierHolder {
    identifiers: IndexMap<String, PendingIdentifierSet>,
}

impl IdentifierHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one identifier for `class`. An empty identifier is ignored.
    pub fn add_identifier(&mut self, class: &str, identifier: IdentifierValues) {
        if identifier.is_empty() {
            return;
        }
        log::trace!("Pending {} {}", class, identifier);
        match self.identifiers.get_mut(class) {
            Some(set) => set.push(identifier),
            None => {
                self.identifiers
                    .insert(class.to_string(), PendingIdentifierSet::from_identifier(identifier));
            }
        }
    }

    /// Classes with pending identifiers, in first-registration order
    pub fn entity_classes(&self) -> Vec<String> {
        self.identifiers.keys().cloned().collect()
    }

    pub fn identifiers(&self, class: &str) -> Option<&PendingIdentifierSet> {
        self.identifiers.get(class)
    }

    pub fn all_identifiers(&self) -> &IndexMap<String, PendingIdentifierSet> {
        &self.identifiers
    }

    pub fn clear_identifiers(&mut self, class: &str) {
        self.identifiers.shift_remove(class);
    }

    pub fn clear_all(&mut self) {
        self.identifiers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}
