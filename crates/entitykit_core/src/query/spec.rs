//! Declarative query specifications.

use crate::model::descriptor::QueryParam;
use crate::model::value::ParamType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    FreeTextSearch,
    EqualityFinder,
    MembershipFinder,
    Custom,
}

/// One named operation synthesized for an entity.
///
/// `predicate` is a SQL boolean expression over the entity alias with
/// `:name` placeholders for `params`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub kind: QueryKind,
    pub entity: String,
    /// Participating fields in declaration order.
    pub fields: Vec<String>,
    pub operation: String,
    pub params: Vec<QueryParam>,
    pub predicate: String,
    /// Whether the operation takes a trailing page request.
    pub pageable: bool,
}

impl QuerySpec {
    /// Parameter signature used as part of the resolver cache key.
    pub fn signature(&self) -> Vec<ParamType> {
        let mut signature: Vec<ParamType> =
            self.params.iter().map(|param| param.param_type).collect();
        if self.pageable {
            signature.push(ParamType::Page);
        }
        signature
    }
}
