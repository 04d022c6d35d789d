//! Association mappings.
//!
//! An [`AssociationMapping`] describes one declared relation between two entity
//! classes: whether it is to-one or to-many, which class it targets, and for
//! to-many associations the inverse field on the target that points back at the
//! owner together with an optional ordering.

use sea_query::Order;

/// Kind of association between two entity classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    /// Single reference (many-to-one or one-to-one)
    ToOne,
    /// Collection of entities that reference the owner (one-to-many)
    ToMany,
}

/// One `ORDER BY` term applied when fetching a to-many association
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub order: Order,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Desc,
        }
    }

    pub fn is_desc(&self) -> bool {
        matches!(self.order, Order::Desc)
    }
}

/// Declared association of an entity class
///
/// # Example
///
/// ```
/// use relations_loader::metadata::{AssociationKind, AssociationMapping, OrderBy};
///
/// // Post.author -> User
/// let author = AssociationMapping::to_one("User");
/// assert_eq!(author.kind(), AssociationKind::ToOne);
///
/// // User.posts -> Post, inverse side Post.author
/// let posts = AssociationMapping::to_many("Post", "author").order_by(OrderBy::desc("created_at"));
/// assert_eq!(posts.mapped_by(), Some("author"));
/// assert_eq!(posts.ordering().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct AssociationMapping {
    kind: AssociationKind,
    target: String,
    mapped_by: Option<String>,
    order_by: Vec<OrderBy>,
}

impl AssociationMapping {
    pub fn to_one(target: impl Into<String>) -> Self {
        Self {
            kind: AssociationKind::ToOne,
            target: target.into(),
            mapped_by: None,
            order_by: Vec::new(),
        }
    }

    /// `mapped_by` is the field on `target` that references the owning entity.
    pub fn to_many(target: impl Into<String>, mapped_by: impl Into<String>) -> Self {
        Self {
            kind: AssociationKind::ToMany,
            target: target.into(),
            mapped_by: Some(mapped_by.into()),
            order_by: Vec::new(),
        }
    }

    /// Append an ordering term, applied when the association is fetched.
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mapped_by(&self) -> Option<&str> {
        self.mapped_by.as_deref()
    }

    pub fn ordering(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn is_to_one(&self) -> bool {
        self.kind == AssociationKind::ToOne
    }
}
