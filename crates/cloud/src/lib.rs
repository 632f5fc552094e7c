//! Durable storage for published artifacts.
//!
//! [`provider::StorageProvider`] is the narrow seam the pipeline
//! depends on: upload bytes under a display name, get back an object
//! identifier. [`s3::S3StorageProvider`] is the production backend;
//! [`local::LocalStorageProvider`] writes into a directory for
//! development setups without object storage.

pub mod local;
pub mod provider;
pub mod s3;
