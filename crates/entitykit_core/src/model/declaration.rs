//! Raw entity declarations, the build-time input of the generator.
//!
//! # Responsibility
//! - Carry the annotations a schema author writes: field types, searchable
//!   markers, archivability and custom queries.
//! - Deserialize from the JSON schema files consumed by the CLI.
//!
//! Declarations are unchecked. `metadata::extractor` turns them into
//! validated `EntityDescriptor`s.

use crate::model::descriptor::{FieldType, QueryParam};
use crate::model::value::ParamType;
use serde::{Deserialize, Serialize};

/// Top-level schema document: every declared entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDeclaration {
    pub entities: Vec<EntityDeclaration>,
}

/// One declared entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    /// Simple name, e.g. `Book`.
    pub name: String,
    /// Fully qualified name, defaults to the simple name.
    #[serde(default)]
    pub qualified_name: Option<String>,
    pub fields: Vec<FieldDeclaration>,
    /// Class-level list of free-text searchable field names.
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub archivable: bool,
    #[serde(default)]
    pub custom_queries: Vec<CustomQueryDeclaration>,
}

impl EntityDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qualified_name: None,
            fields: Vec::new(),
            search_fields: Vec::new(),
            archivable: false,
            custom_queries: Vec::new(),
        }
    }

    pub fn qualified(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds class-level searchable field names.
    pub fn search_by<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn archivable(mut self) -> Self {
        self.archivable = true;
        self
    }

    pub fn custom_query(mut self, query: CustomQueryDeclaration) -> Self {
        self.custom_queries.push(query);
        self
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Field-level free-text search marker.
    #[serde(default)]
    pub searchable: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            searchable: false,
            nullable: true,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Real)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Uuid)
    }

    pub fn to_one(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::new(name, FieldType::ToOne(entity.into()))
    }

    pub fn to_many(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::new(name, FieldType::ToMany(entity.into()))
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Hand-written query attached to an entity.
///
/// `where_clause` is raw SQL over the entity alias (first letter of the
/// entity name, lowercased) and may reference parameters as `:name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQueryDeclaration {
    pub name: String,
    #[serde(default)]
    pub params: Vec<QueryParam>,
    pub where_clause: String,
}

impl CustomQueryDeclaration {
    pub fn new(name: impl Into<String>, where_clause: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            where_clause: where_clause.into(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params.push(QueryParam {
            name: name.into(),
            param_type,
        });
        self
    }
}
