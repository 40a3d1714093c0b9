//! `mealsub-gateway`: HTTP surface of the scheduling engine.
//!
//! The binary in `main.rs` wires configuration, logging and the database;
//! the router lives here so integration tests can drive it in-process.

pub mod app;
pub mod http;
