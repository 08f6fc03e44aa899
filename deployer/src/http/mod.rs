//! MDM backend HTTP client

pub mod api;
pub mod client;
