//! The in-memory object graph.
//!
//! - **Record**: shared entity handles, field values and the materialization
//!   capability (`EntityRef`, `FieldValue`, `Materializable`, `Initializer`)
//! - **Collection**: consistency-tracked to-many collections (`TrackedCollection`)

pub mod record;
#[doc(inline)]
pub use record::{EntityRef, FieldValue, Initializer, Materializable};

pub mod collection;
#[doc(inline)]
pub use collection::TrackedCollection;
