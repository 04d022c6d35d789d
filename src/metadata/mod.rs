//! Entity class metadata.
//!
//! This module describes the shape of entity classes as the loader sees them:
//! - **Identity**: identifier field names, single or composite (`Identity`)
//! - **Identifier values**: the concrete key of one entity (`IdentifierValues`)
//! - **Mapping**: declared associations (`AssociationMapping`, `AssociationKind`, `OrderBy`)
//! - **Class**: per-class metadata and the registry holding it (`ClassMetadata`, `Schema`)

pub mod identity;
#[doc(inline)]
pub use identity::{IdentifierValues, Identity};

pub mod mapping;
#[doc(inline)]
pub use mapping::{AssociationKind, AssociationMapping, OrderBy};

pub mod class;
#[doc(inline)]
pub use class::{ClassMetadata, Schema};
