//! Shared test utilities for the confsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`tree`]: [`ConfigTree`], a temporary Home Assistant configuration
//!   directory with helpers for writing and inspecting files

pub mod tree;

pub use tree::ConfigTree;
