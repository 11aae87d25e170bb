//! Runtime services on top of the repository layer.
//!
//! # Responsibility
//! - Dispatch generic data access to per-entity repositories.
//! - Cache resolved operations and merge record graphs.
//! - Keep callers decoupled from storage details.

pub mod cascade;
pub mod facade;
pub mod resolver_cache;
