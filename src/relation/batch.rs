//! Inputs accepted by [`RelationsLoader::load`](crate::RelationsLoader::load).

use crate::entity::{EntityRef, TrackedCollection};

/// Anything that can be viewed as a flat batch of root entities
///
/// Implemented for a single entity, an optional entity, slices, arrays,
/// vectors and tracked collections.
pub trait AsBatch {
    fn to_batch(&self) -> Vec<EntityRef>;
}

impl AsBatch for EntityRef {
    fn to_batch(&self) -> Vec<EntityRef> {
        vec![self.clone()]
    }
}

impl AsBatch for Option<EntityRef> {
    fn to_batch(&self) -> Vec<EntityRef> {
        self.iter().cloned().collect()
    }
}

impl AsBatch for [EntityRef] {
    fn to_batch(&self) -> Vec<EntityRef> {
        self.to_vec()
    }
}

impl<const N: usize> AsBatch for [EntityRef; N] {
    fn to_batch(&self) -> Vec<EntityRef> {
        self.to_vec()
    }
}

impl AsBatch for Vec<EntityRef> {
    fn to_batch(&self) -> Vec<EntityRef> {
        self.clone()
    }
}

impl AsBatch for TrackedCollection {
    fn to_batch(&self) -> Vec<EntityRef> {
        self.to_vec()
    }
}
