//! Entity model shared by build-time synthesis and the runtime facade.
//!
//! # Responsibility
//! - `declaration`: raw, unchecked schema input.
//! - `descriptor`: validated, immutable entity/field facts.
//! - `value`: dynamic records flowing through repositories and the facade.
//!
//! # Invariants
//! - Every entity is identified by a `uuid` stored in field `id`.

pub mod declaration;
pub mod descriptor;
pub mod value;
