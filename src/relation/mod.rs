//! Relation loading.
//!
//! This module turns a relation specification into batched queries:
//! - **Spec**: relation specifications and their normalized plan (`RelationSpec`, `RelationNode`)
//! - **Holder**: per-class registry of identifiers awaiting a flush (`IdentifierHolder`)
//! - **Loader**: the traversal and hydration driver (`RelationsLoader`)
//! - **Batch**: inputs accepted by `RelationsLoader::load` (`AsBatch`)

// Relation specifications
pub mod spec;
#[doc(inline)]
pub use spec::{RelationNode, RelationSpec, SpecEntry};

// Pending identifiers
pub mod holder;
#[doc(inline)]
pub use holder::{IdentifierHolder, PendingIdentifierSet};

// Loader inputs
pub mod batch;
#[doc(inline)]
pub use batch::AsBatch;

// Loader
pub mod loader;
#[doc(inline)]
pub use loader::RelationsLoader;
