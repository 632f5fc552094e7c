//! Shared domain types and pure logic for the image request pipeline.
//!
//! Nothing in this crate touches the network: moderation, artifact
//! naming, and response formatting are all synchronous and
//! deterministic so that every entry surface renders the same result.

pub mod error;
pub mod moderation;
pub mod naming;
pub mod response;
pub mod types;
