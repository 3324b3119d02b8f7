//! Domain layer types and invariants.

pub mod engagement;
pub mod entities;
pub mod error;
pub mod types;
