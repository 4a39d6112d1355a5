//! Domain layer types and invariants.

pub mod attributes;
pub mod context;
pub mod entities;
pub mod error;
