//! # kiln - build output capture for external build tools
//!
//! `kiln build` hands compilation to an external build tool (`xcodebuild` by default),
//! streams the tool's stdout into a freshly created temporary log file, tells the user where
//! that file is, and blocks until the build has finished.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build every scheme in Release
//! kiln build
//!
//! # One scheme, Debug
//! kiln build --configuration Debug --scheme MyLib
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Log files, output routing and the build orchestrator
//! - [`config`] - Build options and `kiln.toml`
//! - [`commands`] - CLI command handlers

/// Build orchestration and output capture.
pub mod build;

/// CLI command handlers extracted from main.
pub mod commands;

/// Build options and configuration file parsing (`kiln.toml`).
pub mod config;
