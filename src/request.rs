//! Read cluster profiles and job files from JSON
//!
//! Both documents are checked against a bundled JSON schema before they're deserialised, so a
//! typo in a field name is reported instead of silently ignored.

use thiserror::Error;

/// Read a JSON document and check it against a schema
pub mod document;

/// Compile the bundled JSON schemas
pub mod schema;

/// Cluster profile: the environment specific half of every job script
pub mod profile;

/// Job files: lists of jobs to submit in one go
pub mod jobs;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("can't read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("{path} isn't valid JSON: {source}")]
    Decode { path: String, source: serde_json::Error },
    #[error("{path} fails validation: {}", errors.join("; "))]
    Validation { path: String, errors: Vec<String> },
    #[error("can't deserialise {path}: {source}")]
    Deserialise { path: String, source: serde_json::Error },
    #[error("bundled schema {name} doesn't compile: {reason}")]
    Schema { name: &'static str, reason: String },
}
