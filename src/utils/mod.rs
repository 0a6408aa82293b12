//! Shared helpers: input limits and guards.

pub mod limits;
