//! # Monitor Agent
//!
//! The runnable agent on top of [`discovery_framework`]. This library exposes
//! its modules for integration testing.
//!
//! - **[config]**: TOML configuration and its conversion into type sets.
//! - **[snapshot]**: A read-only protocol over a node tree described in TOML.
//! - **[listener]**: The inventory listener that logs every change.
//! - **[lifecycle]**: [`MonitorAgent`](lifecycle::MonitorAgent), which wires configuration to running endpoints.

pub mod config;
pub mod lifecycle;
pub mod listener;
pub mod snapshot;
