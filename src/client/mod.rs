//! Client Module
//!
//! HTTP plumbing and rate limit detection shared by provider clients.

pub mod http;
pub mod rate_limit;

pub use http::HttpClient;
