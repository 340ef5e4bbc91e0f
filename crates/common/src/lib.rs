//! Common utilities and types shared across Meeting Companion crates.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for tracing subscriber setup
pub mod observability;
