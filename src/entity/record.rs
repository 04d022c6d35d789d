//! Shared entity handles.
//!
//! An [`EntityRef`] is a reference-counted handle to one entity in the object
//! graph. Cloning the handle never copies the entity: every holder of the handle
//! observes hydration performed through any other clone. This is what lets the
//! loader fill placeholders "in place" after a batched fetch.
//!
//! An entity is either materialized (all fields present) or a placeholder that
//! only carries its identifier fields. Placeholders are materialized through the
//! [`Materializable`] capability, which delegates to the entity's [`Initializer`].

use crate::entity::collection::TrackedCollection;
use crate::error::LoadError;
use indexmap::IndexMap;
use sea_query::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Value stored in one field of an entity
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Plain column value (identifiers, attributes)
    Scalar(Value),
    /// To-one association; `None` when the reference is null
    Reference(Option<EntityRef>),
    /// To-many association backed by a consistency-tracked collection
    Collection(TrackedCollection),
    /// To-many association held as a plain, untracked list
    List(Vec<EntityRef>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&EntityRef> {
        match self {
            Self::Reference(entity) => entity.as_ref(),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&TrackedCollection> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// Entities reachable through this field, or `None` for a scalar
    pub fn related(&self) -> Option<Vec<EntityRef>> {
        match self {
            Self::Scalar(_) => None,
            Self::Reference(entity) => Some(entity.iter().cloned().collect()),
            Self::Collection(collection) => Some(collection.to_vec()),
            Self::List(entities) => Some(entities.clone()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<EntityRef> for FieldValue {
    fn from(entity: EntityRef) -> Self {
        Self::Reference(Some(entity))
    }
}

impl From<TrackedCollection> for FieldValue {
    fn from(collection: TrackedCollection) -> Self {
        Self::Collection(collection)
    }
}

/// Loads the data of a placeholder entity
///
/// Implemented by storage layers; an implementation must leave `entity`
/// materialized (see [`EntityRef::hydrate`]) when it returns `Ok`.
pub trait Initializer {
    fn initialize(&self, entity: &EntityRef) -> Result<(), LoadError>;
}

/// Capability of an entity reference that may still be an unloaded placeholder
pub trait Materializable {
    fn is_materialized(&self) -> bool;

    /// Load the entity if it is a placeholder. No-op when already materialized.
    fn force_materialize(&self) -> Result<(), LoadError>;
}

struct EntityData {
    class: String,
    materialized: bool,
    fields: IndexMap<String, FieldValue>,
    initializer: Option<Rc<dyn Initializer>>,
}

/// Shared handle to one entity
///
/// Equality is identity: two handles are equal when they point at the same
/// entity, which is what an identity map guarantees for equal identifiers.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<EntityData>>);

impl EntityRef {
    /// A new, materialized entity without fields
    pub fn new(class: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(EntityData {
            class: class.into(),
            materialized: true,
            fields: IndexMap::new(),
            initializer: None,
        })))
    }

    /// A placeholder carrying only its identifier fields
    pub fn placeholder<'a, I>(
        class: impl Into<String>,
        identifier: I,
        initializer: Option<Rc<dyn Initializer>>,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let fields = identifier
            .into_iter()
            .map(|(field, value)| (field.to_string(), FieldValue::Scalar(value.clone())))
            .collect();
        Self(Rc::new(RefCell::new(EntityData {
            class: class.into(),
            materialized: false,
            fields,
            initializer,
        })))
    }

    pub fn with_scalar(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(field, FieldValue::Scalar(value.into()));
        self
    }

    pub fn with_field(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(field, value.into());
        self
    }

    pub fn class(&self) -> String {
        self.0.borrow().class.clone()
    }

    pub fn is_class(&self, class: &str) -> bool {
        self.0.borrow().class == class
    }

    pub fn field(&self, field: &str) -> Option<FieldValue> {
        self.0.borrow().fields.get(field).cloned()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.borrow().fields.contains_key(field)
    }

    pub fn set_field(&self, field: impl Into<String>, value: FieldValue) {
        self.0.borrow_mut().fields.insert(field.into(), value);
    }

    pub fn scalar(&self, field: &str) -> Option<Value> {
        match self.field(field) {
            Some(FieldValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn reference(&self, field: &str) -> Option<EntityRef> {
        match self.field(field) {
            Some(FieldValue::Reference(entity)) => entity,
            _ => None,
        }
    }

    pub fn collection(&self, field: &str) -> Option<TrackedCollection> {
        match self.field(field) {
            Some(FieldValue::Collection(collection)) => Some(collection),
            _ => None,
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.0.borrow().fields.keys().cloned().collect()
    }

    /// Fill the entity with `fields` and mark it materialized.
    ///
    /// Existing fields not present in `fields` are kept.
    pub fn hydrate(&self, fields: IndexMap<String, FieldValue>) {
        let mut data = self.0.borrow_mut();
        data.fields.extend(fields);
        data.materialized = true;
    }

    pub fn set_initializer(&self, initializer: Option<Rc<dyn Initializer>>) {
        self.0.borrow_mut().initializer = initializer;
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn describe_identifier(&self) -> String {
        let data = self.0.borrow();
        let scalars: Vec<String> = data
            .fields
            .iter()
            .filter_map(|(field, value)| value.as_scalar().map(|v| format!("{}: {:?}", field, v)))
            .collect();
        format!("{{{}}}", scalars.join(", "))
    }
}

impl Materializable for EntityRef {
    fn is_materialized(&self) -> bool {
        self.0.borrow().materialized
    }

    fn force_materialize(&self) -> Result<(), LoadError> {
        // The borrow must end before the initializer hydrates this entity.
        let initializer = {
            let data = self.0.borrow();
            if data.materialized {
                return Ok(());
            }
            data.initializer.clone()
        };

        if let Some(initializer) = initializer {
            initializer.initialize(self)?;
        }

        if self.is_materialized() {
            Ok(())
        } else {
            Err(LoadError::EntityNotFound {
                class: self.class(),
                identifier: self.describe_identifier(),
            })
        }
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EntityRef {}

// Associations are rendered by class only: the graph may contain cycles.
impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(data) = self.0.try_borrow() else {
            return write!(f, "EntityRef(<borrowed>)");
        };
        let mut s = f.debug_struct(&data.class);
        s.field("materialized", &data.materialized);
        for (name, value) in &data.fields {
            match value {
                FieldValue::Scalar(v) => s.field(name, v),
                FieldValue::Reference(None) => s.field(name, &None::<()>),
                FieldValue::Reference(Some(entity)) => s.field(name, &ClassOnly(entity)),
                FieldValue::Collection(collection) => s.field(name, collection),
                FieldValue::List(entities) => s.field(name, &format_args!("[{} entities]", entities.len())),
            };
        }
        s.finish()
    }
}

struct ClassOnly<'a>(&'a EntityRef);

impl fmt::Debug for ClassOnly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 .0.try_borrow() {
            Ok(data) => write!(f, "<{}>", data.class),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
