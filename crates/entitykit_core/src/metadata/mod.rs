//! Build-time metadata extraction.
//!
//! # Responsibility
//! - Turn raw declarations into validated descriptors.
//! - Report rejected declaration parts as non-fatal diagnostics.

pub mod diagnostic;
pub mod extractor;
