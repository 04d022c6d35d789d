//! # relations-loader
//!
//! Batched eager loading of object-graph associations.
//!
//! Given a batch of loaded entities and a relation specification, the
//! [`RelationsLoader`] collects the identifiers each related class needs,
//! issues one query per class per traversal level through a
//! [`PersistencePort`], and back-fills the results into the graph, to-many
//! collections included. This avoids the N+1 queries of lazy loading.
//!
//! Storage is abstracted behind [`PersistencePort`]; [`memory::InMemoryStore`]
//! is an identity-mapped implementation with a query log.
//!
//! Optional features: `metrics` (OpenTelemetry counters) and `tracing` (spans
//! around loads and flushes), both enabled by default.

pub mod config;
pub mod entity;
pub mod error;
pub mod memory;
pub mod metadata;
pub mod metrics;
pub mod port;
pub mod query;
pub mod relation;

pub use config::LoaderConfig;
pub use entity::{EntityRef, FieldValue, Initializer, Materializable, TrackedCollection};
pub use error::LoadError;
pub use port::PersistencePort;
pub use query::Criteria;
pub use relation::{AsBatch, IdentifierHolder, RelationNode, RelationSpec, RelationsLoader};
