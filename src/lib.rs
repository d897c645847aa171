pub mod api;
pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod store;
pub mod types;
