pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod naming;
pub mod output;
pub mod progress;
pub mod sources;
pub mod store;
