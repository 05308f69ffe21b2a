//! Application services: resolution, admin writes and background work.

pub mod admin;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod jobs;
pub mod repos;
pub mod resolver;
pub mod tasks;
