//! Utility modules.
//!
//! - [`HttpClient`]: shared `reqwest` client used for every Google API and
//!   metadata-server round trip

mod http;

pub use http::HttpClient;
