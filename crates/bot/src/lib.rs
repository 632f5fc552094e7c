//! `imagebot` library crate.
//!
//! Re-exports the Discord adapters and configuration for testing. The
//! binary entrypoint lives in `main.rs`.

pub mod commands;
pub mod config;
pub mod handler;
pub mod sink;
