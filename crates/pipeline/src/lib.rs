//! Request orchestration pipeline.
//!
//! One [`coordinator::RequestCoordinator`] run takes a
//! [`imagebot_core::types::Request`] through moderation, optional
//! enhancement, job submission and polling, artifact download, and
//! publication, then hands a single [`coordinator::Outcome`] back to
//! the entry adapter's [`sink::ReplySink`].

pub mod artifact;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod locks;
pub mod orchestrator;
pub mod publisher;
pub mod sink;
