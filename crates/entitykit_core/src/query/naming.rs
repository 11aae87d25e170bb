//! Operation naming convention shared by synthesis and runtime resolution.
//!
//! # Invariants
//! - Names are a pure function of the attribute name. The facade derives the
//!   same names at run time and has no fallback when they drift.

use convert_case::{Case, Casing};

/// Operation name of the synthesized free-text search.
pub const FREE_TEXT_OPERATION: &str = "freeTextSearch";

/// Parameter name of the free-text search term.
pub const SEARCH_TERM_PARAM: &str = "searchTerm";

const EQUALITY_PREFIX: &str = "findBy";
const MEMBERSHIP_PREFIX: &str = "findAllBy";
const MEMBERSHIP_SUFFIX: &str = "In";

/// PascalCase form of an attribute name: `firstName` and `first_name` both
/// become `FirstName`.
pub fn to_pascal_case(name: &str) -> String {
    name.to_case(Case::Pascal)
}

/// Query alias of an entity: its first letter, lowercased.
pub fn entity_alias(entity: &str) -> String {
    entity
        .chars()
        .next()
        .map(|first| first.to_lowercase().collect())
        .unwrap_or_default()
}

/// Single-value equality finder: `findBy` + PascalCase(name).
pub fn equality_finder_name(attribute: &str) -> String {
    format!("{EQUALITY_PREFIX}{}", to_pascal_case(attribute))
}

/// Set-membership finder: `findAllBy` + PascalCase(name) + `In`.
pub fn membership_finder_name(attribute: &str) -> String {
    format!(
        "{MEMBERSHIP_PREFIX}{}{MEMBERSHIP_SUFFIX}",
        to_pascal_case(attribute)
    )
}

/// Whether `name` is reserved by synthesized operations of some attribute.
pub fn is_reserved_operation_name(name: &str) -> bool {
    name == FREE_TEXT_OPERATION
        || name.starts_with(EQUALITY_PREFIX)
        || name.starts_with(MEMBERSHIP_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::{equality_finder_name, is_reserved_operation_name, membership_finder_name};

    #[test]
    fn camel_case_attribute_names() {
        assert_eq!(equality_finder_name("firstName"), "findByFirstName");
        assert_eq!(membership_finder_name("firstName"), "findAllByFirstNameIn");
    }

    #[test]
    fn snake_case_attribute_names() {
        assert_eq!(equality_finder_name("first_name"), "findByFirstName");
        assert_eq!(membership_finder_name("first_name"), "findAllByFirstNameIn");
        assert_eq!(equality_finder_name("id"), "findById");
    }

    #[test]
    fn reserved_names_cover_synthesized_prefixes() {
        assert!(is_reserved_operation_name("freeTextSearch"));
        assert!(is_reserved_operation_name("findByTitle"));
        assert!(is_reserved_operation_name("findAllByTitleIn"));
        assert!(!is_reserved_operation_name("recentBestsellers"));
    }
}
