//! Relation specifications and their normalized traversal plan.
//!
//! A [`RelationSpec`] says which associations to resolve. It accepts the shapes
//! callers naturally write:
//!
//! ```
//! use relations_loader::RelationSpec;
//!
//! // a single relation
//! let one = RelationSpec::from("author");
//! // a flat list
//! let flat = RelationSpec::from(["author", "comments"]);
//! // a tree, built explicitly ...
//! let tree = RelationSpec::new()
//!     .with("comments")
//!     .nested("author", RelationSpec::new().nested("company", "country"));
//! // ... or from dotted paths
//! let parsed: RelationSpec = "comments, author.company.country".parse().unwrap();
//! assert_eq!(tree.normalize(), parsed.normalize());
//! ```
//!
//! [`RelationSpec::normalize`] turns a relation spec into the [`RelationNode`] tree the
//! loader walks. At every level it:
//! 1. adds a leaf for each branch whose name is not already listed as a leaf;
//! 2. moves all leaves before all branches, keeping relative order within each
//!    group.
//!
//! Leaves only register identifiers; a branch needs its association already
//! resolved by the matching leaf before it can walk the child entities.

use crate::error::LoadError;
use std::str::FromStr;

/// One entry of a [`RelationSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecEntry {
    /// Resolve the relation only
    Leaf(String),
    /// Resolve the relation, then the nested spec on the related entities
    Nested(String, RelationSpec),
}

/// Declarative description of the relations to load
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationSpec {
    entries: Vec<SpecEntry>,
}

/// Normalized traversal plan node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationNode {
    Leaf(String),
    Branch(String, Vec<RelationNode>),
}

impl RelationNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(name) | Self::Branch(name, _) => name,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}

impl RelationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relation without nesting
    pub fn with(mut self, relation: impl Into<String>) -> Self {
        self.entries.push(SpecEntry::Leaf(relation.into()));
        self
    }

    /// Add a relation and the relations to load on its targets
    pub fn nested(mut self, relation: impl Into<String>, children: impl Into<RelationSpec>) -> Self {
        self.entries
            .push(SpecEntry::Nested(relation.into(), children.into()));
        self
    }

    pub fn entries(&self) -> &[SpecEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a relation spec from JSON
    ///
    /// A string is a relation name, an array is a list of specs, and an object
    /// maps relation names to nested specs (`null`, `true`, `[]` or `{}` meaning
    /// no nesting).
    ///
    /// ```
    /// use relations_loader::RelationSpec;
    /// use serde_json::json;
    ///
    /// let spec = RelationSpec::from_json(&json!(["comments", {"author": "company"}])).unwrap();
    /// assert_eq!(spec, RelationSpec::new().with("comments").nested("author", "company"));
    /// ```
    pub fn from_json(value: &serde_json::Value) -> Result<Self, LoadError> {
        let mut spec = RelationSpec::new();
        spec.extend_json(value)?;
        Ok(spec)
    }

    fn extend_json(&mut self, value: &serde_json::Value) -> Result<(), LoadError> {
        use serde_json::Value as Json;

        match value {
            Json::Null => {}
            Json::String(name) => {
                self.entries.push(SpecEntry::Leaf(checked_name(name)?));
            }
            Json::Array(items) => {
                for item in items {
                    self.extend_json(item)?;
                }
            }
            Json::Object(map) => {
                for (name, child) in map {
                    let name = checked_name(name)?;
                    match child {
                        Json::Null | Json::Bool(true) => self.entries.push(SpecEntry::Leaf(name)),
                        _ => {
                            let child = RelationSpec::from_json(child)?;
                            self.entries.push(SpecEntry::Nested(name, child));
                        }
                    }
                }
            }
            other => {
                return Err(LoadError::InvalidRelationSpec(format!(
                    "expected a relation name, list or object, found {}",
                    other
                )))
            }
        }
        Ok(())
    }

    fn insert_path(&mut self, segments: &[&str]) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() {
            let listed = self.entries.iter().any(|entry| match entry {
                SpecEntry::Leaf(name) | SpecEntry::Nested(name, _) => name.as_str() == *head,
            });
            if !listed {
                self.entries.push(SpecEntry::Leaf(head.to_string()));
            }
            return;
        }

        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            SpecEntry::Nested(name, child) if name.as_str() == *head => Some(child),
            _ => None,
        });
        match existing {
            Some(child) => child.insert_path(rest),
            None => {
                let mut child = RelationSpec::new();
                child.insert_path(rest);
                self.entries.push(SpecEntry::Nested(head.to_string(), child));
            }
        }
    }

    /// Build the traversal plan: synthetic leaves added, leaves before branches.
    ///
    /// Nested specs are normalized recursively, so the loader never inspects the
    /// raw shape again.
    pub fn normalize(&self) -> Vec<RelationNode> {
        let mut nodes: Vec<RelationNode> = self
            .entries
            .iter()
            .map(|entry| match entry {
                SpecEntry::Leaf(name) => RelationNode::Leaf(name.clone()),
                SpecEntry::Nested(name, child) if child.is_empty() => RelationNode::Leaf(name.clone()),
                SpecEntry::Nested(name, child) => RelationNode::Branch(name.clone(), child.normalize()),
            })
            .collect();

        let branch_names: Vec<String> = nodes
            .iter()
            .filter(|node| !node.is_leaf())
            .map(|node| node.name().to_string())
            .collect();
        for name in branch_names {
            let has_leaf = nodes
                .iter()
                .any(|node| matches!(node, RelationNode::Leaf(leaf) if *leaf == name));
            if !has_leaf {
                nodes.push(RelationNode::Leaf(name));
            }
        }

        // stable partition
        let (mut leaves, branches): (Vec<_>, Vec<_>) =
            nodes.into_iter().partition(RelationNode::is_leaf);
        leaves.extend(branches);
        leaves
    }
}

fn checked_name(name: &str) -> Result<String, LoadError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LoadError::InvalidRelationSpec(
            "relation name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Parse comma-separated dotted paths, e.g. `"comments, author.company"`.
impl FromStr for RelationSpec {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut spec = RelationSpec::new();
        for path in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let segments = path
                .split('.')
                .map(|segment| {
                    let segment = segment.trim();
                    if segment.is_empty() {
                        Err(LoadError::InvalidRelationSpec(format!(
                            "empty segment in relation path `{}`",
                            path
                        )))
                    } else {
                        Ok(segment)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            spec.insert_path(&segments);
        }
        Ok(spec)
    }
}

impl From<&str> for RelationSpec {
    fn from(relation: &str) -> Self {
        RelationSpec::new().with(relation)
    }
}

impl From<String> for RelationSpec {
    fn from(relation: String) -> Self {
        RelationSpec::new().with(relation)
    }
}

impl From<&[&str]> for RelationSpec {
    fn from(relations: &[&str]) -> Self {
        relations.iter().fold(RelationSpec::new(), |spec, r| spec.with(*r))
    }
}

impl<const N: usize> From<[&str; N]> for RelationSpec {
    fn from(relations: [&str; N]) -> Self {
        relations.into_iter().fold(RelationSpec::new(), |spec, r| spec.with(r))
    }
}

impl From<Vec<&str>> for RelationSpec {
    fn from(relations: Vec<&str>) -> Self {
        relations.into_iter().fold(RelationSpec::new(), |spec, r| spec.with(r))
    }
}

impl From<Vec<String>> for RelationSpec {
    fn from(relations: Vec<String>) -> Self {
        relations.into_iter().fold(RelationSpec::new(), |spec, r| spec.with(r))
    }
}

impl From<&RelationSpec> for RelationSpec {
    fn from(spec: &RelationSpec) -> Self {
        spec.clone()
    }
}
