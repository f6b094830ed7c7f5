//! Shared plumbing for the sunrelay crates: an HTTP client wrapper, a small
//! filesystem document store and a few common types.

pub mod crypto;
pub mod dirs;
pub mod fs;
pub mod http;
pub mod json;
pub mod store;
pub mod types;
