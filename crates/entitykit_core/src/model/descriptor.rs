//! Validated entity and field descriptors.
//!
//! # Responsibility
//! - Describe the shape of every entity for synthesis, storage and merging.
//! - Build default instances and validate records before persistence.
//!
//! # Invariants
//! - Descriptors are immutable once produced by the extractor.
//! - Every descriptor carries exactly one identifier field, `id: uuid`.
//! - Field order is declaration order.

use crate::model::declaration::CustomQueryDeclaration;
use crate::model::value::{ParamType, Record, Value, ID_FIELD};
use crate::query::naming::entity_alias;
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Suffix of every repository handle name, e.g. `BookRepository`.
pub const REPOSITORY_SUFFIX: &str = "Repository";

/// Declared type of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Bool,
    Uuid,
    ToOne(String),
    ToMany(String),
}

impl FieldType {
    pub fn relation(&self) -> RelationKind {
        match self {
            Self::ToOne(_) => RelationKind::ToOne,
            Self::ToMany(_) => RelationKind::ToMany,
            _ => RelationKind::None,
        }
    }

    /// Target entity of a relation type.
    pub fn related_entity(&self) -> Option<&str> {
        match self {
            Self::ToOne(entity) | Self::ToMany(entity) => Some(entity.as_str()),
            _ => None,
        }
    }

    /// Signature tag for scalar types.
    pub fn param_type(&self) -> Option<ParamType> {
        match self {
            Self::Text => Some(ParamType::Text),
            Self::Integer => Some(ParamType::Integer),
            Self::Real => Some(ParamType::Real),
            Self::Bool => Some(ParamType::Bool),
            Self::Uuid => Some(ParamType::Uuid),
            Self::ToOne(_) | Self::ToMany(_) => None,
        }
    }

    /// Zero value used by default instances for non-nullable fields.
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Text => Value::Text(String::new()),
            Self::Integer => Value::Integer(0),
            Self::Real => Value::Real(0.0),
            Self::Bool => Value::Bool(false),
            Self::Uuid | Self::ToOne(_) => Value::Null,
            Self::ToMany(_) => Value::List(Vec::new()),
        }
    }

    /// Whether `value` may be stored in a field of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text, Value::Text(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::Real, Value::Real(_) | Value::Integer(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Uuid, Value::Uuid(_)) => true,
            (Self::ToOne(entity), Value::Entity(record)) => record.entity() == entity,
            (Self::ToMany(entity), Value::List(records)) => {
                records.iter().all(|record| record.entity() == entity)
            }
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Text => "text".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Real => "real".to_string(),
            Self::Bool => "bool".to_string(),
            Self::Uuid => "uuid".to_string(),
            Self::ToOne(entity) => format!("to_one({entity})"),
            Self::ToMany(entity) => format!("to_many({entity})"),
        }
    }
}

/// Relation kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    None,
    ToOne,
    ToMany,
}

/// Named, typed parameter of a synthesized or custom operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
}

/// Field-level facts extracted from a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub identifier: bool,
    pub searchable: bool,
    pub cascade_updatable: bool,
}

impl FieldDescriptor {
    pub fn relation(&self) -> RelationKind {
        self.field_type.relation()
    }

    pub fn related_entity(&self) -> Option<&str> {
        self.field_type.related_entity()
    }

    pub fn is_text(&self) -> bool {
        self.field_type == FieldType::Text
    }

    pub fn is_scalar(&self) -> bool {
        self.relation() == RelationKind::None
    }

    /// Storage column. To-one relations store the related id in `<name>_id`;
    /// to-many relations have no column.
    pub fn column(&self) -> Option<String> {
        match self.relation() {
            RelationKind::None => Some(self.name.clone()),
            RelationKind::ToOne => Some(format!("{}_id", self.name)),
            RelationKind::ToMany => None,
        }
    }
}

/// Immutable description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub qualified_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub archivable: bool,
    pub custom_queries: Vec<CustomQueryDeclaration>,
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn identifier(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.identifier)
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.searchable)
    }

    pub fn cascade_updatable_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.cascade_updatable)
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_scalar())
    }

    pub fn to_one_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|field| field.relation() == RelationKind::ToOne)
    }

    pub fn to_many_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|field| field.relation() == RelationKind::ToMany)
    }

    /// SQL table name, snake case of the entity name.
    pub fn table_name(&self) -> String {
        self.name.to_case(Case::Snake)
    }

    /// Query alias, the first letter of the entity name lowercased.
    pub fn alias(&self) -> String {
        entity_alias(&self.name)
    }

    /// Declared name of the repository handle bound to this entity.
    pub fn repository_name(&self) -> String {
        format!("{}{REPOSITORY_SUFFIX}", self.name)
    }

    /// Builds a fresh, unsaved instance.
    ///
    /// Nullable fields start as `Null`, non-nullable scalars as their zero
    /// value, collections as empty lists. The id stays unset until saved.
    pub fn default_instance(&self) -> Record {
        let mut record = Record::new(self.name.clone());
        for field in &self.fields {
            let value = if field.identifier {
                Value::Null
            } else if field.relation() == RelationKind::ToMany || !field.nullable {
                field.field_type.zero_value()
            } else {
                Value::Null
            };
            record.set(field.name.clone(), value);
        }
        record
    }

    /// Validates a record against this descriptor.
    ///
    /// `inserting` additionally requires every non-nullable field to be present.
    pub fn validate_record(
        &self,
        record: &Record,
        inserting: bool,
    ) -> Result<(), RecordValidationError> {
        if record.entity() != self.name {
            return Err(RecordValidationError::EntityMismatch {
                expected: self.name.clone(),
                actual: record.entity().to_string(),
            });
        }

        for (name, value) in record.fields() {
            let field = self
                .field(name)
                .ok_or_else(|| RecordValidationError::UnknownField {
                    entity: self.name.clone(),
                    field: name.to_string(),
                })?;
            if !field.field_type.accepts(value) {
                return Err(RecordValidationError::TypeMismatch {
                    entity: self.name.clone(),
                    field: name.to_string(),
                    expected: field.field_type.describe(),
                });
            }
            if value.is_null() && !field.nullable && !field.identifier {
                return Err(RecordValidationError::MissingRequired {
                    entity: self.name.clone(),
                    field: name.to_string(),
                });
            }
        }

        if inserting {
            let missing = self.fields.iter().find(|field| {
                !field.nullable
                    && !field.identifier
                    && field.relation() != RelationKind::ToMany
                    && record.is_absent(&field.name)
            });
            if let Some(field) = missing {
                return Err(RecordValidationError::MissingRequired {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Record-shape violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    EntityMismatch { expected: String, actual: String },
    UnknownField { entity: String, field: String },
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
    },
    MissingRequired { entity: String, field: String },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityMismatch { expected, actual } => {
                write!(f, "record of entity `{actual}` given where `{expected}` is expected")
            }
            Self::UnknownField { entity, field } => {
                write!(f, "entity `{entity}` has no field `{field}`")
            }
            Self::TypeMismatch {
                entity,
                field,
                expected,
            } => write!(f, "field `{entity}.{field}` expects a {expected} value"),
            Self::MissingRequired { entity, field } => {
                write!(f, "field `{entity}.{field}` is required")
            }
        }
    }
}

impl Error for RecordValidationError {}

/// Returns whether `field` names the identifier field.
pub fn is_identifier_name(field: &str) -> bool {
    field == ID_FIELD
}

#[cfg(test)]
mod tests {
    use super::{EntityDescriptor, FieldDescriptor, FieldType, RecordValidationError};
    use crate::model::value::{Record, Value};

    fn field(name: &str, field_type: FieldType, nullable: bool) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            field_type,
            nullable,
            identifier: name == "id",
            searchable: false,
            cascade_updatable: name != "id",
        }
    }

    fn book() -> EntityDescriptor {
        EntityDescriptor {
            name: "BookReview".to_string(),
            qualified_name: "library.BookReview".to_string(),
            fields: vec![
                field("id", FieldType::Uuid, false),
                field("title", FieldType::Text, false),
                field("stars", FieldType::Integer, true),
                field("author", FieldType::ToOne("Author".to_string()), true),
                field("tags", FieldType::ToMany("Tag".to_string()), true),
            ],
            archivable: false,
            custom_queries: Vec::new(),
        }
    }

    #[test]
    fn naming_helpers_follow_entity_name() {
        let descriptor = book();
        assert_eq!(descriptor.table_name(), "book_review");
        assert_eq!(descriptor.alias(), "b");
        assert_eq!(descriptor.repository_name(), "BookReviewRepository");
    }

    #[test]
    fn default_instance_uses_zero_values_for_required_fields() {
        let instance = book().default_instance();
        assert_eq!(instance.entity(), "BookReview");
        assert_eq!(instance.raw("title"), Some(&Value::Text(String::new())));
        assert_eq!(instance.raw("stars"), Some(&Value::Null));
        assert_eq!(instance.raw("tags"), Some(&Value::List(Vec::new())));
        assert_eq!(instance.id(), None);
    }

    #[test]
    fn validate_record_rejects_wrong_types_and_missing_required() {
        let descriptor = book();
        let wrong_type = Record::new("BookReview").with("stars", "five");
        assert!(matches!(
            descriptor.validate_record(&wrong_type, false),
            Err(RecordValidationError::TypeMismatch { .. })
        ));

        let missing = Record::new("BookReview").with("stars", 5_i64);
        assert!(descriptor.validate_record(&missing, false).is_ok());
        assert!(matches!(
            descriptor.validate_record(&missing, true),
            Err(RecordValidationError::MissingRequired { .. })
        ));

        let wrong_relation =
            Record::new("BookReview").with("author", Record::new("Publisher"));
        assert!(descriptor.validate_record(&wrong_relation, false).is_err());
    }
}
