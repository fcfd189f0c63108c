//! Common types and utilities shared across the crate

pub mod errors;
