//! HTTP networking module
//!
//! Provides the HTTP client used to reach the places and summarizer APIs.

mod client;
mod request;

pub use client::HttpClient;
pub use request::{ApiRequest, ApiResponse, HttpMethod, RequestBody};
