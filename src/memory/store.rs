//! Identity-mapped in-memory persistence port.

use crate::entity::{EntityRef, FieldValue, Initializer, TrackedCollection};
use crate::error::LoadError;
use crate::metadata::identity::value_key;
use crate::metadata::{AssociationKind, ClassMetadata, IdentifierValues, OrderBy, Schema};
use crate::port::PersistencePort;
use crate::query::Criteria;
use indexmap::IndexMap;
use sea_query::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

/// One stored cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    /// Foreign key to the target of the to-one association on this field
    Reference(IdentifierValues),
    NullReference,
}

/// A stored row of one entity class
#[derive(Debug, Clone)]
pub struct Row {
    class: String,
    cells: IndexMap<String, Cell>,
}

impl Row {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            cells: IndexMap::new(),
        }
    }

    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cells.insert(field.into(), Cell::Value(value.into()));
        self
    }

    /// Reference the entity identified by `identifier`; the target class comes
    /// from the to-one association declared on `field`.
    pub fn reference(mut self, field: impl Into<String>, identifier: IdentifierValues) -> Self {
        self.cells.insert(field.into(), Cell::Reference(identifier));
        self
    }

    pub fn null_reference(mut self, field: impl Into<String>) -> Self {
        self.cells.insert(field.into(), Cell::NullReference);
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn cell(&self, field: &str) -> Option<&Cell> {
        self.cells.get(field)
    }

    // References compare by the referenced identifier, as a foreign key column would.
    fn resolve(&self, field: &str) -> Option<Value> {
        match self.cells.get(field)? {
            Cell::Value(value) => Some(value.clone()),
            Cell::Reference(identifier) => identifier.single_value().cloned(),
            Cell::NullReference => None,
        }
    }
}

/// What a logged query was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// `find_by_identifier_set`
    Batch,
    /// Single-row lookup materializing one placeholder
    Materialize,
}

/// One logged query
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub class: String,
    pub kind: QueryKind,
    pub criteria: Criteria,
    /// Inline PostgreSQL rendering of the query
    pub sql: String,
}

#[derive(Default)]
struct StoreState {
    tables: IndexMap<String, Vec<Row>>,
    identity_map: HashMap<(String, String), EntityRef>,
    log: Vec<QueryRecord>,
    failing: HashSet<String>,
}

struct Shared {
    schema: Schema,
    state: RefCell<StoreState>,
}

/// In-memory [`PersistencePort`] with an identity map and a query log
///
/// Every entity handed out is registered in the identity map, so the same
/// identifier always yields the same [`EntityRef`]. References become
/// placeholders whose initializer performs a logged single-row lookup, which
/// mirrors lazy loading in an SQL-backed mapper.
///
/// ```
/// use relations_loader::memory::{InMemoryStore, Row};
/// use relations_loader::metadata::{AssociationMapping, ClassMetadata, IdentifierValues, Identity, Schema};
/// use relations_loader::RelationsLoader;
///
/// let schema = Schema::new()
///     .class(ClassMetadata::new("User", Identity::unary("id")))
///     .class(
///         ClassMetadata::new("Post", Identity::unary("id"))
///             .association("author", AssociationMapping::to_one("User")),
///     );
/// let store = InMemoryStore::new(schema);
/// store.insert(Row::new("User").value("id", 1).value("name", "ada")).unwrap();
/// store
///     .insert(Row::new("Post").value("id", 7).reference("author", IdentifierValues::single("id", 1)))
///     .unwrap();
///
/// let posts = store.find_all("Post").unwrap();
/// RelationsLoader::new(&store).load(&posts, "author").unwrap();
/// assert_eq!(store.query_count(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Rc<Shared>,
}

impl InMemoryStore {
    pub fn new(schema: Schema) -> Self {
        Self {
            shared: Rc::new(Shared {
                schema,
                state: RefCell::new(StoreState::default()),
            }),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    /// Store a row
    ///
    /// # Errors
    ///
    /// `UnknownClass` when the row's class is not in the schema,
    /// `MissingIdentifier` when an identifier field has no value.
    pub fn insert(&self, row: Row) -> Result<(), LoadError> {
        let metadata = self.shared.schema.get(&row.class)?;
        for field in metadata.identity().iter() {
            if !matches!(row.cell(field), Some(Cell::Value(_))) {
                return Err(LoadError::MissingIdentifier {
                    class: row.class.clone(),
                    field: field.to_string(),
                });
            }
        }
        let mut state = self.shared.state.borrow_mut();
        state.tables.entry(row.class.clone()).or_default().push(row);
        Ok(())
    }

    /// Materialized entity for `identifier`, `None` when no row matches.
    ///
    /// Fixture accessor: not recorded in the query log.
    pub fn find(&self, class: &str, identifier: &IdentifierValues) -> Result<Option<EntityRef>, LoadError> {
        self.shared.schema.get(class)?;
        let row = {
            let state = self.shared.state.borrow();
            find_row(&state, class, identifier)
        };
        row.map(|row| self.shared.hydrate(&row)).transpose()
    }

    /// Every stored entity of `class`, materialized, in insertion order.
    ///
    /// Fixture accessor: not recorded in the query log.
    pub fn find_all(&self, class: &str) -> Result<Vec<EntityRef>, LoadError> {
        self.shared.schema.get(class)?;
        let rows: Vec<Row> = {
            let state = self.shared.state.borrow();
            state.tables.get(class).cloned().unwrap_or_default()
        };
        rows.iter().map(|row| self.shared.hydrate(row)).collect()
    }

    /// Placeholder for `identifier`, or the entity already in the identity map
    pub fn reference(&self, class: &str, identifier: &IdentifierValues) -> Result<EntityRef, LoadError> {
        self.shared.schema.get(class)?;
        Ok(self.shared.reference(class, identifier))
    }

    pub fn queries(&self) -> Vec<QueryRecord> {
        self.shared.state.borrow().log.clone()
    }

    pub fn query_count(&self) -> usize {
        self.shared.state.borrow().log.len()
    }

    pub fn clear_log(&self) {
        self.shared.state.borrow_mut().log.clear();
    }

    /// Make every later query on `class` fail with `LoadError::Storage`.
    pub fn fail_queries_for(&self, class: impl Into<String>) {
        self.shared.state.borrow_mut().failing.insert(class.into());
    }
}

impl PersistencePort for InMemoryStore {
    fn class_metadata(&self, class: &str) -> Result<&ClassMetadata, LoadError> {
        self.shared.schema.get(class)
    }

    fn find_by_identifier_set(
        &self,
        class: &str,
        criteria: &Criteria,
        order_by: &[OrderBy],
    ) -> Result<Vec<EntityRef>, LoadError> {
        let metadata = self.shared.schema.get(class)?;
        let mut rows: Vec<Row> = {
            let mut state = self.shared.state.borrow_mut();
            check_failure(&state, class)?;
            state.log.push(QueryRecord {
                class: class.to_string(),
                kind: QueryKind::Batch,
                criteria: criteria.clone(),
                sql: criteria.to_sql(metadata.table_name(), order_by),
            });
            state
                .tables
                .get(class)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| criteria.matches(|field| row.resolve(field)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        // stable: ties keep insertion order
        rows.sort_by(|a, b| {
            order_by
                .iter()
                .map(|term| {
                    let ordering = compare_values(a.resolve(&term.field), b.resolve(&term.field));
                    if term.is_desc() {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        rows.iter().map(|row| self.shared.hydrate(row)).collect()
    }
}

impl Shared {
    fn reference(self: &Rc<Self>, class: &str, identifier: &IdentifierValues) -> EntityRef {
        let key = (class.to_string(), identifier.key());
        let mut state = self.state.borrow_mut();
        if let Some(existing) = state.identity_map.get(&key) {
            return existing.clone();
        }
        let initializer: Rc<dyn Initializer> = Rc::new(StoreInitializer {
            shared: Rc::downgrade(self),
        });
        let placeholder = EntityRef::placeholder(class, identifier.iter(), Some(initializer));
        state.identity_map.insert(key, placeholder.clone());
        placeholder
    }

    /// Turn a row into an entity through the identity map.
    ///
    /// An entity already materialized is returned untouched; a placeholder is
    /// filled in place.
    fn hydrate(self: &Rc<Self>, row: &Row) -> Result<EntityRef, LoadError> {
        use crate::entity::Materializable;

        let metadata = self.schema.get(&row.class)?;
        let identifier = row_identifier(metadata, row)?;
        let key = (row.class.clone(), identifier.key());

        let existing = self.state.borrow().identity_map.get(&key).cloned();
        if let Some(entity) = &existing {
            if entity.is_materialized() {
                return Ok(entity.clone());
            }
        }

        let mut fields = IndexMap::new();
        for (field, cell) in &row.cells {
            let value = match cell {
                Cell::Value(value) => FieldValue::Scalar(value.clone()),
                Cell::NullReference => FieldValue::Reference(None),
                Cell::Reference(target_id) => {
                    let mapping = metadata.association_mapping(field)?;
                    FieldValue::Reference(Some(self.reference(mapping.target(), target_id)))
                }
            };
            fields.insert(field.clone(), value);
        }
        for (field, mapping) in metadata.associations() {
            if mapping.kind() == AssociationKind::ToMany && !fields.contains_key(field) {
                fields.insert(field.to_string(), FieldValue::Collection(TrackedCollection::new()));
            }
        }

        let entity = match existing {
            Some(entity) => entity,
            None => {
                let entity = EntityRef::new(row.class.clone());
                self.state
                    .borrow_mut()
                    .identity_map
                    .insert(key, entity.clone());
                entity
            }
        };
        entity.hydrate(fields);
        Ok(entity)
    }

    fn materialize(self: &Rc<Self>, entity: &EntityRef) -> Result<(), LoadError> {
        let class = entity.class();
        let metadata = self.schema.get(&class)?;
        let identifier = metadata.identifier_values(entity)?;
        let criteria = Criteria::AnyOf(vec![identifier.clone()]);

        let row = {
            let mut state = self.state.borrow_mut();
            check_failure(&state, &class)?;
            state.log.push(QueryRecord {
                class: class.clone(),
                kind: QueryKind::Materialize,
                sql: criteria.to_sql(metadata.table_name(), &[]),
                criteria,
            });
            find_row(&state, &class, &identifier)
        };

        // A missing row leaves the placeholder unmaterialized.
        if let Some(row) = row {
            log::trace!("Materializing {} {}", class, identifier);
            self.hydrate(&row)?;
        }
        Ok(())
    }
}

struct StoreInitializer {
    shared: Weak<Shared>,
}

impl Initializer for StoreInitializer {
    fn initialize(&self, entity: &EntityRef) -> Result<(), LoadError> {
        let shared = self
            .shared
            .upgrade()
            .ok_or_else(|| LoadError::Storage("the store backing this entity was dropped".to_string()))?;
        shared.materialize(entity)
    }
}

fn check_failure(state: &StoreState, class: &str) -> Result<(), LoadError> {
    if state.failing.contains(class) {
        return Err(LoadError::Storage(format!("query on {} failed", class)));
    }
    Ok(())
}

fn row_identifier(metadata: &ClassMetadata, row: &Row) -> Result<IdentifierValues, LoadError> {
    metadata
        .identity()
        .iter()
        .map(|field| match row.cell(field) {
            Some(Cell::Value(value)) => Ok((field, value.clone())),
            _ => Err(LoadError::MissingIdentifier {
                class: row.class.clone(),
                field: field.to_string(),
            }),
        })
        .collect()
}

fn find_row(state: &StoreState, class: &str, identifier: &IdentifierValues) -> Option<Row> {
    state.tables.get(class)?.iter().find(|row| {
        identifier
            .iter()
            .all(|(field, value)| row.resolve(field).as_ref() == Some(value))
    }).cloned()
}

/// Order two column values; nulls sort first.
fn compare_values(a: Option<Value>, b: Option<Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (numeric(&a), numeric(&b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (&a, &b) {
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => value_key(&a).cmp(&value_key(&b)),
            },
        },
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::TinyInt(Some(v)) => Some(f64::from(*v)),
        Value::SmallInt(Some(v)) => Some(f64::from(*v)),
        Value::Int(Some(v)) => Some(f64::from(*v)),
        Value::BigInt(Some(v)) => Some(*v as f64),
        Value::TinyUnsigned(Some(v)) => Some(f64::from(*v)),
        Value::SmallUnsigned(Some(v)) => Some(f64::from(*v)),
        Value::Unsigned(Some(v)) => Some(f64::from(*v)),
        Value::BigUnsigned(Some(v)) => Some(*v as f64),
        Value::Float(Some(v)) => Some(f64::from(*v)),
        Value::Double(Some(v)) => Some(*v),
        _ => None,
    }
}
