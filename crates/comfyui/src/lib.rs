//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper (job submission, history retrieval,
//! artifact download), the text-to-image job graph, history parsing,
//! and the seed source used for each submission.

pub mod api;
pub mod history;
pub mod seed;
pub mod workflow;
