//! Feature toggles with percentage rollouts, resolved through an in-process cache,
//! a durable edge cache and the database.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
