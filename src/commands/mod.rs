//! CLI command handlers
//!
//! This module contains the implementation of CLI command handlers
//! kept out of main.rs.

pub mod build;
