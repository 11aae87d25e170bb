//! Query synthesis: naming convention, specs and the generation pipeline.

pub mod generate;
pub mod naming;
pub mod spec;
pub mod synthesizer;
