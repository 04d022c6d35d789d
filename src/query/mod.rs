//! Query construction for batched fetches.
//!
//! - **Criteria**: the predicate of one batched fetch (`Criteria`) and its
//!   SeaQuery rendering

pub mod criteria;
#[doc(inline)]
pub use criteria::Criteria;
