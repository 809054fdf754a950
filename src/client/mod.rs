//! Fever client modules
//!
//! The HTTP layer lives in [`api`], request and fetch settings in
//! [`config`], and the paginated item walk in [`fetch`].

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;

#[cfg(test)]
mod tests;

// Re-export main types for convenience
pub use api::{Endpoint, FeverApi};
pub use config::{
    ClientConfig, DebugConfig, FetchConfig, FetchDirection, HttpMethod, ItemMark, ItemQuery,
    RequestConfig,
};
pub use error::{ClientError, Result};
pub use fetch::{BulkFetch, BulkFetchReport};
