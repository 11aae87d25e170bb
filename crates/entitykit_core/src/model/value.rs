//! Dynamic runtime values for entity instances.
//!
//! # Responsibility
//! - Represent any entity instance as a `Record` so one facade can serve
//!   every entity type without per-type code.
//! - Classify values into `ParamType`s used by operation signatures.
//!
//! # Invariants
//! - A missing field and `Value::Null` are both "absent".
//! - The identifier of every record lives in field [`ID_FIELD`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Name of the identifier field carried by every entity.
pub const ID_FIELD: &str = "id";

/// Name of the flag field carried by archivable entities.
pub const ARCHIVED_FIELD: &str = "is_archived";

/// One field value of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Uuid(Uuid),
    /// To-one relation value.
    Entity(Box<Record>),
    /// To-many relation value.
    List(Vec<Record>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Entity(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            Self::List(records) => Some(records.as_slice()),
            _ => None,
        }
    }

    /// Parameter type of this value, `None` for `Null`.
    ///
    /// Relation values classify as their carrier shape so they never match a
    /// scalar finder signature.
    pub fn param_type(&self) -> Option<ParamType> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(ParamType::Text),
            Self::Integer(_) => Some(ParamType::Integer),
            Self::Real(_) => Some(ParamType::Real),
            Self::Bool(_) => Some(ParamType::Bool),
            Self::Uuid(_) => Some(ParamType::Uuid),
            Self::Entity(_) => Some(ParamType::Entity),
            Self::List(_) => Some(ParamType::List),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Self::Entity(Box::new(value))
    }
}

impl From<Vec<Record>> for Value {
    fn from(value: Vec<Record>) -> Self {
        Self::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Type tag of one operation parameter.
///
/// Operation signatures are ordered lists of these tags. `List` is the
/// membership-finder carrier and `Page` marks a pagination slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Text,
    Integer,
    Real,
    Bool,
    Uuid,
    Entity,
    List,
    Page,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Bool => "bool",
            Self::Uuid => "uuid",
            Self::Entity => "entity",
            Self::List => "list",
            Self::Page => "page",
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamic entity instance: owning entity name plus field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    entity: String,
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record of the given entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Runtime entity type of this record.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn id(&self) -> Option<Uuid> {
        self.get(ID_FIELD).and_then(Value::as_uuid)
    }

    pub fn set_id(&mut self, id: Uuid) {
        self.set(ID_FIELD, Value::Uuid(id));
    }

    /// Returns a present (non-null) field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    /// Returns the stored value including explicit `Null`.
    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes and returns a field value.
    pub fn take(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Whether the field is missing or `Null`.
    pub fn is_absent(&self, field: &str) -> bool {
        self.get(field).is_none()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    pub fn related(&self, field: &str) -> Option<&Record> {
        self.get(field).and_then(Value::as_record)
    }

    pub fn list(&self, field: &str) -> Option<&[Record]> {
        self.get(field).and_then(Value::as_list)
    }
}

#[cfg(test)]
mod tests {
    use super::{ParamType, Record, Value};
    use uuid::Uuid;

    #[test]
    fn null_and_missing_fields_are_both_absent() {
        let record = Record::new("Book").with("title", Value::Null);
        assert!(record.is_absent("title"));
        assert!(record.is_absent("isbn"));
        assert!(record.contains("title"));
        assert!(!record.contains("isbn"));
    }

    #[test]
    fn id_reads_uuid_field_only() {
        let id = Uuid::new_v4();
        let mut record = Record::new("Book").with("id", "not-a-uuid");
        assert_eq!(record.id(), None);
        record.set_id(id);
        assert_eq!(record.id(), Some(id));
    }

    #[test]
    fn param_type_follows_value_shape() {
        assert_eq!(Value::from("x").param_type(), Some(ParamType::Text));
        assert_eq!(Value::from(3_i64).param_type(), Some(ParamType::Integer));
        assert_eq!(Value::Null.param_type(), None);
        assert_eq!(
            Value::from(vec![Record::new("Book")]).param_type(),
            Some(ParamType::List)
        );
    }

    #[test]
    fn option_converts_none_to_null() {
        let none: Option<&str> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
    }
}
