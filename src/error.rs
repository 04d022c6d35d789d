//! Error type for relation loading.
//!
//! Every fallible operation in the crate returns [`LoadError`]. Errors raised by a
//! [`PersistencePort`](crate::port::PersistencePort) implementation are propagated
//! unchanged; the loader never retries and never swallows a failure.

use thiserror::Error;

/// Error raised while resolving relations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The persistence port has no metadata for the entity class
    #[error("Unknown entity class: {0}")]
    UnknownClass(String),

    /// The relation name is not a declared association of the class
    #[error("Unknown association {class}::{field}")]
    UnknownAssociation { class: String, field: String },

    /// The entity has no field with this name
    #[error("Unknown field {class}::{field}")]
    UnknownField { class: String, field: String },

    /// The field exists but holds a scalar where an association was expected
    #[error("Field {class}::{field} does not hold an association")]
    NotAnAssociation { class: String, field: String },

    /// An identifier field is missing or is not a scalar value
    #[error("Missing identifier field {class}::{field}")]
    MissingIdentifier { class: String, field: String },

    /// To-many hydration needs a single-field owner identifier
    #[error("To-many association {class}::{relation} requires a single-field owner identifier")]
    CompositeInverseKey { class: String, relation: String },

    /// A placeholder could not be materialized because its row does not exist
    #[error("Entity {class} {identifier} not found")]
    EntityNotFound { class: String, identifier: String },

    /// The relation specification could not be parsed
    #[error("Invalid relation specification: {0}")]
    InvalidRelationSpec(String),

    /// The storage layer failed to execute a query
    #[error("Storage error: {0}")]
    Storage(String),
}
