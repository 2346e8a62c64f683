//! NeuroGrid live telemetry server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod live;
pub mod routes;
pub mod state;
pub mod ws;
