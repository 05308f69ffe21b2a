//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod keys;
pub mod rollout;
pub mod types;
pub mod value;
pub mod view;
