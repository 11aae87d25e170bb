//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the generic per-entity data access contract.
//! - Isolate SQLite query details from facade orchestration.
//! - Map entity names to repository handles.
//!
//! # Invariants
//! - Repository writes validate records against their descriptor first.
//! - Repository APIs return semantic errors (`NotFound`, `UnknownField`) in
//!   addition to DB transport errors.

pub mod registry;
pub mod repository;
pub mod sqlite_repo;
