//! Hub API client functionality for hubstress
//!
//! This crate provides the HTTP facade over the hub's lifecycle-management
//! API: one trait method per operation, an implementation over a shared
//! reqwest client with retry-on-stress-status behavior, and a dry-run
//! variant that fabricates successful responses without network I/O.

pub mod client;
pub mod errors;
pub mod retry;
pub mod types;

// Re-export main types for convenience
pub use client::{HubApi, HubClient};
pub use errors::HttpError;
pub use retry::RetryPolicy;
pub use types::{ActivityPayload, ApiResponse, ServerRecord, UserRecord};
