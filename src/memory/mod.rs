//! In-memory storage.
//!
//! - **Store**: an identity-mapped [`PersistencePort`](crate::port::PersistencePort)
//!   with a query log, used by the test suite and for embedding (`InMemoryStore`,
//!   `Row`, `Cell`, `QueryRecord`, `QueryKind`)

pub mod store;
#[doc(inline)]
pub use store::{Cell, InMemoryStore, QueryKind, QueryRecord, Row};
