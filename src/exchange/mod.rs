//! Exchange module - Gateway implementation for the futures REST API

pub mod auth;
pub mod messages;
pub mod rest;

pub use rest::FuturesRestClient;
