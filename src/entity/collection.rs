//! Consistency-tracked collections.
//!
//! A [`TrackedCollection`] backs a to-many association. It records whether its
//! contents reflect storage (`initialized`) and keeps a baseline snapshot so
//! later change detection can compute what was inserted or removed.
//!
//! There are two ways to change the contents:
//! - the normal mutators ([`TrackedCollection::add`], [`TrackedCollection::remove`])
//!   mark the collection dirty;
//! - [`TrackedCollection::backing_mut`] hands out the raw backing vector without
//!   any change tracking. It exists for hydration: entities appended while loading
//!   from storage are not user changes. Nothing else should use it.

use crate::entity::record::EntityRef;
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

#[derive(Default)]
struct CollectionState {
    initialized: bool,
    dirty: bool,
    items: Vec<EntityRef>,
    snapshot: Vec<EntityRef>,
}

/// Shared handle to a consistency-tracked collection
#[derive(Clone, Default)]
pub struct TrackedCollection(Rc<RefCell<CollectionState>>);

impl TrackedCollection {
    /// An empty collection whose contents have not been loaded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection already reflecting storage, with `items` as its baseline
    pub fn loaded(items: Vec<EntityRef>) -> Self {
        Self(Rc::new(RefCell::new(CollectionState {
            initialized: true,
            dirty: false,
            snapshot: items.clone(),
            items,
        })))
    }

    pub fn is_initialized(&self) -> bool {
        self.0.borrow().initialized
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.0.borrow_mut().initialized = initialized;
    }

    /// Record the current contents as the baseline and clear the dirty flag.
    pub fn take_snapshot(&self) {
        let mut state = self.0.borrow_mut();
        state.snapshot = state.items.clone();
        state.dirty = false;
    }

    pub fn snapshot(&self) -> Vec<EntityRef> {
        self.0.borrow().snapshot.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.0.borrow().dirty
    }

    pub fn add(&self, entity: EntityRef) {
        let mut state = self.0.borrow_mut();
        state.items.push(entity);
        state.dirty = true;
    }

    /// Remove the first occurrence of `entity`; returns whether it was present.
    pub fn remove(&self, entity: &EntityRef) -> bool {
        let mut state = self.0.borrow_mut();
        match state.items.iter().position(|e| e.ptr_eq(entity)) {
            Some(index) => {
                state.items.remove(index);
                state.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Raw backing vector, bypassing change tracking. Reserved for hydration.
    pub fn backing_mut(&self) -> RefMut<'_, Vec<EntityRef>> {
        RefMut::map(self.0.borrow_mut(), |state| &mut state.items)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.0.borrow().items.iter().any(|e| e.ptr_eq(entity))
    }

    pub fn to_vec(&self) -> Vec<EntityRef> {
        self.0.borrow().items.clone()
    }

    /// Entities present now but absent from the snapshot
    pub fn insert_diff(&self) -> Vec<EntityRef> {
        let state = self.0.borrow();
        state
            .items
            .iter()
            .filter(|e| !state.snapshot.iter().any(|s| s.ptr_eq(e)))
            .cloned()
            .collect()
    }

    /// Entities in the snapshot that are no longer present
    pub fn delete_diff(&self) -> Vec<EntityRef> {
        let state = self.0.borrow();
        state
            .snapshot
            .iter()
            .filter(|s| !state.items.iter().any(|e| e.ptr_eq(s)))
            .cloned()
            .collect()
    }

    pub fn ptr_eq(&self, other: &TrackedCollection) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TrackedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(state) => f
                .debug_struct("TrackedCollection")
                .field("initialized", &state.initialized)
                .field("dirty", &state.dirty)
                .field("len", &state.items.len())
                .finish(),
            Err(_) => write!(f, "TrackedCollection(<borrowed>)"),
        }
    }
}
