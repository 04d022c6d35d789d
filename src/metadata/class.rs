//! Class metadata and the schema registry.

use crate::entity::{EntityRef, FieldValue};
use crate::error::LoadError;
use crate::metadata::identity::{IdentifierValues, Identity};
use crate::metadata::mapping::AssociationMapping;
use indexmap::IndexMap;

/// Metadata for one entity class: storage table, identifier fields, associations
#[derive(Debug, Clone)]
pub struct ClassMetadata {
    name: String,
    table: String,
    identity: Identity,
    associations: IndexMap<String, AssociationMapping>,
}

impl ClassMetadata {
    /// Create metadata for `name`; the table defaults to the class name.
    pub fn new(name: impl Into<String>, identity: Identity) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            identity,
            associations: IndexMap::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Declare an association on `field`
    pub fn association(mut self, field: impl Into<String>, mapping: AssociationMapping) -> Self {
        self.associations.insert(field.into(), mapping);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn associations(&self) -> impl Iterator<Item = (&str, &AssociationMapping)> {
        self.associations.iter().map(|(field, mapping)| (field.as_str(), mapping))
    }

    /// Look up the association declared on `field`
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::UnknownAssociation`] when no association is declared
    /// under that name.
    pub fn association_mapping(&self, field: &str) -> Result<&AssociationMapping, LoadError> {
        self.associations
            .get(field)
            .ok_or_else(|| LoadError::UnknownAssociation {
                class: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Read a field of an entity of this class
    pub fn field_value(&self, entity: &EntityRef, field: &str) -> Result<FieldValue, LoadError> {
        entity.field(field).ok_or_else(|| LoadError::UnknownField {
            class: self.name.clone(),
            field: field.to_string(),
        })
    }

    /// Overwrite a field of an entity of this class
    pub fn set_field_value(&self, entity: &EntityRef, field: &str, value: FieldValue) {
        entity.set_field(field, value);
    }

    /// Extract the identifier of `entity` according to this class's identity
    ///
    /// Works on placeholders as well as materialized entities: a placeholder
    /// always carries its identifier fields.
    pub fn identifier_values(&self, entity: &EntityRef) -> Result<IdentifierValues, LoadError> {
        let mut values = IdentifierValues::new();
        for field in self.identity.iter() {
            match entity.field(field) {
                Some(FieldValue::Scalar(value)) => values.insert(field, value),
                _ => {
                    return Err(LoadError::MissingIdentifier {
                        class: self.name.clone(),
                        field: field.to_string(),
                    })
                }
            }
        }
        Ok(values)
    }
}

/// Registry of class metadata keyed by class name
#[derive(Debug, Clone, Default)]
pub struct Schema {
    classes: IndexMap<String, ClassMetadata>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, metadata: ClassMetadata) -> Self {
        self.classes.insert(metadata.name().to_string(), metadata);
        self
    }

    pub fn get(&self, class: &str) -> Result<&ClassMetadata, LoadError> {
        self.classes
            .get(class)
            .ok_or_else(|| LoadError::UnknownClass(class.to_string()))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassMetadata> {
        self.classes.values()
    }
}
