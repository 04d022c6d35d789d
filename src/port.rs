//! `PersistencePort` - the storage boundary of the loader.
//!
//! The loader never talks to a database directly. Everything it needs from
//! storage goes through this trait, injected when the loader is constructed:
//! class metadata, identifier extraction and one batched fetch primitive.
//! [`InMemoryStore`](crate::memory::InMemoryStore) is the in-crate implementation.

use crate::entity::EntityRef;
use crate::error::LoadError;
use crate::metadata::{ClassMetadata, IdentifierValues, OrderBy};
use crate::query::Criteria;

/// Storage operations required by [`RelationsLoader`](crate::RelationsLoader)
///
/// # Identity map
///
/// `find_by_identifier_set` must hydrate through an identity map: when a fetched
/// row corresponds to an entity already present in the graph (typically a
/// placeholder reached through a to-one association), the implementation must
/// materialize *that* [`EntityRef`] in place and return it, rather than create a
/// second handle for the same identifier. The loader relies on this to back-fill
/// associations without rewriting references.
///
/// # Query shapes
///
/// The loader issues three shapes, all through `find_by_identifier_set`:
/// - `Criteria::AnyOf` with no ordering, for composite identifiers;
/// - `Criteria::In` with ordering, for to-many associations declaring an order;
/// - `Criteria::In` with an empty `order_by`, the plain find-by-field-set case.
pub trait PersistencePort {
    /// Metadata for an entity class
    ///
    /// # Errors
    ///
    /// Returns `LoadError::UnknownClass` when the class is not mapped.
    fn class_metadata(&self, class: &str) -> Result<&ClassMetadata, LoadError>;

    /// Identifier of an entity, placeholders included
    fn identifier_values(&self, entity: &EntityRef) -> Result<IdentifierValues, LoadError> {
        self.class_metadata(&entity.class())?.identifier_values(entity)
    }

    /// Fetch every entity of `class` matching `criteria`, ordered by `order_by`
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Storage` when the query fails. The loader propagates
    /// the error without retrying.
    fn find_by_identifier_set(
        &self,
        class: &str,
        criteria: &Criteria,
        order_by: &[OrderBy],
    ) -> Result<Vec<EntityRef>, LoadError>;
}
