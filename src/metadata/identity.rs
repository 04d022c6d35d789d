//! Identifier field sets and identifier values.
//!
//! [`Identity`] names the field(s) that make up an entity class's identifier, and
//! [`IdentifierValues`] carries the concrete values of one identifier. Both support
//! single-field and composite keys.

use sea_query::Value;
use std::fmt;

/// Separator used when joining identifier values into a deduplication key
pub const KEY_SEPARATOR: &str = "|";

/// The identifier field(s) of an entity class
///
/// # Example
///
/// ```
/// use relations_loader::metadata::Identity;
///
/// let single = Identity::unary("id");
/// assert_eq!(single.arity(), 1);
///
/// let composite = Identity::composite(["tenant_id", "id"]);
/// assert_eq!(composite.arity(), 2);
/// assert!(composite.contains("tenant_id"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Single field identifier
    Unary(String),
    /// Identifier made of two or more fields, in declaration order
    Composite(Vec<String>),
}

impl Identity {
    pub fn unary(field: impl Into<String>) -> Self {
        Self::Unary(field.into())
    }

    /// Build a composite identity; a single field collapses to `Unary`.
    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.len() == 1 {
            Self::Unary(fields.remove(0))
        } else {
            Self::Composite(fields)
        }
    }

    /// Number of fields in this identity
    pub fn arity(&self) -> usize {
        match self {
            Self::Unary(_) => 1,
            Self::Composite(fields) => fields.len(),
        }
    }

    /// Iterate over the field names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let fields: &[String] = match self {
            Self::Unary(field) => std::slice::from_ref(field),
            Self::Composite(fields) => fields,
        };
        fields.iter().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.iter().any(|f| f == field)
    }
}

/// Concrete values of one identifier, as ordered `field → value` pairs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IdentifierValues {
    pairs: Vec<(String, Value)>,
}

impl IdentifierValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// A one-field identifier
    pub fn single(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            pairs: vec![(field.into(), value.into())],
        }
    }

    /// Append a field; replaces the value when the field is already present.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(f, _)| *f == field) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((field, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.pairs.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(f, v)| (f.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.pairs.iter().map(|(_, v)| v)
    }

    /// The value of a one-field identifier
    pub fn single_value(&self) -> Option<&Value> {
        match self.pairs.as_slice() {
            [(_, value)] => Some(value),
            _ => None,
        }
    }

    /// Deduplication key: values joined with [`KEY_SEPARATOR`]
    ///
    /// Values are rendered with their `Debug` form so `Int(1)` and `String("1")`
    /// never produce the same key.
    pub fn key(&self) -> String {
        self.values().map(value_key).collect::<Vec<_>>().join(KEY_SEPARATOR)
    }
}

impl fmt::Display for IdentifierValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", field, value)?;
        }
        write!(f, "}}")
    }
}

impl<F, V> FromIterator<(F, V)> for IdentifierValues
where
    F: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (F, V)>>(iter: T) -> Self {
        let mut values = IdentifierValues::new();
        for (field, value) in iter {
            values.insert(field, value);
        }
        values
    }
}

/// Key of a single value, consistent with [`IdentifierValues::key`]
pub fn value_key(value: &Value) -> String {
    format!("{:?}", value)
}
