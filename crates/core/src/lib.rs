//! Core business logic for relation-rs.

pub mod services;

pub use services::*;
