//! Canon CLI - command-line interface for the Canon registry.
//!
//! This crate provides the `canon` tool for checking version compatibility,
//! migrating external stores and reporting drift against the canonical
//! snapshot.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod project;
