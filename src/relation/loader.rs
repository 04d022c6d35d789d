//! Batched eager loading of associations.
//!
//! [`RelationsLoader`] resolves the associations named by a [`RelationSpec`] for
//! a batch of already-loaded entities, issuing one query per entity class per
//! traversal level instead of one per entity.
//!
//! # Example
//!
//! ```
//! use relations_loader::memory::{InMemoryStore, Row};
//! use relations_loader::metadata::{AssociationMapping, ClassMetadata, IdentifierValues, Identity, Schema};
//! use relations_loader::{Materializable, RelationSpec, RelationsLoader};
//!
//! let schema = Schema::new()
//!     .class(ClassMetadata::new("Company", Identity::unary("id")))
//!     .class(
//!         ClassMetadata::new("User", Identity::unary("id"))
//!             .association("company", AssociationMapping::to_one("Company")),
//!     )
//!     .class(
//!         ClassMetadata::new("Post", Identity::unary("id"))
//!             .association("author", AssociationMapping::to_one("User")),
//!     );
//! let store = InMemoryStore::new(schema);
//! store.insert(Row::new("Company").value("id", 1)).unwrap();
//! for user in 1..=2 {
//!     store
//!         .insert(Row::new("User").value("id", user).reference("company", IdentifierValues::single("id", 1)))
//!         .unwrap();
//! }
//! for post in 1..=4 {
//!     store
//!         .insert(Row::new("Post").value("id", post).reference("author", IdentifierValues::single("id", post % 2 + 1)))
//!         .unwrap();
//! }
//!
//! let posts = store.find_all("Post").unwrap();
//! let mut loader = RelationsLoader::new(&store);
//! loader.load(&posts, RelationSpec::new().nested("author", "company")).unwrap();
//!
//! // one query for the users, one for their company
//! assert_eq!(store.query_count(), 2);
//! assert!(posts[0].reference("author").unwrap().is_materialized());
//! ```
//!
//! # Traversal
//!
//! The relation spec is normalized once per call (see [`RelationSpec::normalize`]). At
//! each level:
//! - a **leaf** registers the identifiers of unloaded to-one targets, or loads a
//!   to-many association right away and fills its collections;
//! - a **branch** flushes the identifiers pending for its target class, then
//!   recurses into the distinct targets with its children.
//!
//! Identifiers still pending after the walk are flushed at the end, one query
//! per class.

use crate::config::LoaderConfig;
use crate::entity::{EntityRef, FieldValue, Materializable, TrackedCollection};
use crate::error::LoadError;
use crate::metadata::{AssociationKind, AssociationMapping, ClassMetadata, IdentifierValues, OrderBy};
use crate::port::PersistencePort;
use crate::query::Criteria;
use crate::relation::batch::AsBatch;
use crate::relation::holder::{IdentifierHolder, PendingIdentifierSet};
use crate::relation::spec::{RelationNode, RelationSpec};
use indexmap::IndexMap;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Eager loader bound to one persistence port
pub struct RelationsLoader<'p, P: PersistencePort + ?Sized> {
    port: &'p P,
    holder: IdentifierHolder,
    config: LoaderConfig,
}

impl<'p, P: PersistencePort + ?Sized> RelationsLoader<'p, P> {
    pub fn new(port: &'p P) -> Self {
        Self::with_config(port, LoaderConfig::default())
    }

    pub fn with_config(port: &'p P, config: LoaderConfig) -> Self {
        Self {
            port,
            holder: IdentifierHolder::new(),
            config,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Identifiers still pending. Empty after a successful `load`.
    pub fn holder(&self) -> &IdentifierHolder {
        &self.holder
    }

    /// Resolve `relations` on every entity of `data`, in place
    ///
    /// Returns `data` itself so calls can be chained.
    ///
    /// # Errors
    ///
    /// Unknown relations and storage failures abort the call. Flushes completed
    /// before the failure stay applied to the graph.
    pub fn load<'d, D>(&mut self, data: &'d D, relations: impl Into<RelationSpec>) -> Result<&'d D, LoadError>
    where
        D: AsBatch + ?Sized,
    {
        self.holder.clear_all();

        let batch = data.to_batch();
        if batch.is_empty() {
            return Ok(data);
        }
        let nodes = relations.into().normalize();

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::load_span(batch.len()).entered();

        self.do_load(&batch, &nodes)?;
        self.load_entities()?;
        Ok(data)
    }

    fn do_load(&mut self, batch: &[EntityRef], nodes: &[RelationNode]) -> Result<(), LoadError> {
        // rows of a batch share the class of the first row
        let Some(class) = batch.first().map(EntityRef::class) else {
            return Ok(());
        };
        for node in nodes {
            match node {
                RelationNode::Leaf(relation) => self.load_relation(&class, batch, relation)?,
                RelationNode::Branch(relation, children) => {
                    let (target_class, targets) = self.prepare_data(&class, batch, relation)?;
                    if targets.is_empty() {
                        log::debug!("No {} targets for {}, skipping nested relations", target_class, relation);
                        continue;
                    }
                    self.load_entities_by_class(&target_class, &[])?;
                    self.do_load(&targets, children)?;
                }
            }
        }
        Ok(())
    }

    /// Distinct targets of `relation` across the batch, in first-seen order
    fn prepare_data(
        &self,
        class: &str,
        batch: &[EntityRef],
        relation: &str,
    ) -> Result<(String, Vec<EntityRef>), LoadError> {
        let port = self.port;
        let metadata = port.class_metadata(class)?;
        let mapping = metadata.association_mapping(relation)?;
        let target_metadata = port.class_metadata(mapping.target())?;

        let mut targets: IndexMap<String, EntityRef> = IndexMap::new();
        for row in batch {
            let related = metadata
                .field_value(row, relation)?
                .related()
                .ok_or_else(|| not_an_association(metadata, relation))?;
            for target in related {
                let key = target_metadata.identifier_values(&target)?.key();
                targets.entry(key).or_insert(target);
            }
        }
        Ok((mapping.target().to_string(), targets.into_values().collect()))
    }

    fn load_relation(&mut self, class: &str, batch: &[EntityRef], relation: &str) -> Result<(), LoadError> {
        let port = self.port;
        let metadata = port.class_metadata(class)?;
        let mapping = metadata.association_mapping(relation)?;

        match mapping.kind() {
            AssociationKind::ToOne => {
                for row in batch {
                    row.force_materialize()?;
                    match metadata.field_value(row, relation)? {
                        FieldValue::Reference(Some(target)) if !target.is_materialized() => {
                            let identifier = port.identifier_values(&target)?;
                            self.holder.add_identifier(mapping.target(), identifier);
                        }
                        FieldValue::Reference(_) => {}
                        _ => return Err(not_an_association(metadata, relation)),
                    }
                }
                Ok(())
            }
            AssociationKind::ToMany => self.load_collection(batch, metadata, mapping, relation),
        }
    }

    fn load_collection(
        &mut self,
        batch: &[EntityRef],
        metadata: &ClassMetadata,
        mapping: &AssociationMapping,
        relation: &str,
    ) -> Result<(), LoadError> {
        let port = self.port;
        let mapped_by = mapping
            .mapped_by()
            .ok_or_else(|| not_an_association(metadata, relation))?;

        let mut pending: Vec<TrackedCollection> = Vec::new();
        for row in batch {
            row.force_materialize()?;
            match metadata.field_value(row, relation)? {
                FieldValue::Collection(collection) if !collection.is_initialized() => {
                    let identifier = port.identifier_values(row)?;
                    let owner_id = identifier.single_value().ok_or_else(|| LoadError::CompositeInverseKey {
                        class: metadata.name().to_string(),
                        relation: relation.to_string(),
                    })?;
                    self.holder
                        .add_identifier(mapping.target(), IdentifierValues::single(mapped_by, owner_id.clone()));
                    pending.push(collection);
                }
                // already loaded, or untracked
                FieldValue::Collection(_) | FieldValue::List(_) => {}
                _ => return Err(not_an_association(metadata, relation)),
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let targets = self.load_entities_by_class(mapping.target(), mapping.ordering())?;
        let target_metadata = port.class_metadata(mapping.target())?;
        for target in &targets {
            let Some(owner) = target_metadata.field_value(target, mapped_by)?.as_reference().cloned() else {
                continue;
            };
            let Some(collection) = owner.collection(relation) else {
                continue;
            };
            // Only collections of this batch; appends bypass change tracking.
            if pending.iter().any(|c| c.ptr_eq(&collection)) {
                collection.backing_mut().push(target.clone());
            }
        }

        for collection in &pending {
            collection.set_initialized(true);
            collection.take_snapshot();
        }
        Ok(())
    }

    /// Flush the identifiers pending for `class`
    ///
    /// The pending set is cleared once every query succeeded. Composite sets are
    /// never ordered.
    fn load_entities_by_class(&mut self, class: &str, order_by: &[OrderBy]) -> Result<Vec<EntityRef>, LoadError> {
        let Some(criteria) = self.holder.identifiers(class).and_then(PendingIdentifierSet::to_criteria) else {
            self.holder.clear_identifiers(class);
            return Ok(Vec::new());
        };
        let order_by: &[OrderBy] = match criteria {
            Criteria::AnyOf(_) => &[],
            Criteria::In { .. } => order_by,
        };
        let chunks = match self.config.max_batch_size {
            Some(size) if criteria.len() > size => criteria.chunks(size),
            _ => vec![criteria],
        };
        let identifiers: usize = chunks.iter().map(Criteria::len).sum();

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::flush_span(class, identifiers).entered();
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let mut loaded = Vec::new();
        for chunk in &chunks {
            loaded.extend(self.port.find_by_identifier_set(class, chunk, order_by)?);
        }
        self.holder.clear_identifiers(class);

        log::debug!(
            "Loaded {} {} entities for {} identifiers in {} queries",
            loaded.len(),
            class,
            identifiers,
            chunks.len()
        );
        #[cfg(feature = "metrics")]
        METRICS.record_flush(class, chunks.len(), loaded.len(), start.elapsed());

        Ok(loaded)
    }

    fn load_entities(&mut self) -> Result<(), LoadError> {
        for class in self.holder.entity_classes() {
            self.load_entities_by_class(&class, &[])?;
        }
        Ok(())
    }
}

fn not_an_association(metadata: &ClassMetadata, relation: &str) -> LoadError {
    LoadError::NotAnAssociation {
        class: metadata.name().to_string(),
        field: relation.to_string(),
    }
}
