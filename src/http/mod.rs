//! HTTP client module with status classification.

mod client;
mod status;

pub use client::{HttpClient, USER_AGENT};
pub use status::{StatusError, classify_status};
