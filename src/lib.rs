pub mod aggregate;
pub mod api;
pub mod config;
pub mod content_type;
pub mod error;
pub mod extract;
pub mod filter;
pub mod models;
pub mod page;
pub mod probe;
pub mod region;
pub mod urls;
