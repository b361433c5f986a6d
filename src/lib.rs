pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod histogram;
pub mod mempool_visibility;
pub mod network_overview;
pub mod parquet;
pub mod query;
pub mod table;

#[cfg(test)]
pub mod test_support;

pub use client::{ClickHouseClient, QueryClient};
pub use error::{Error, Result};
pub use query::{Param, Params, Query};
pub use table::{Column, Table};
