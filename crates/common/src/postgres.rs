mod client;
mod config;
mod submit_log_repository;

pub use client::*;
pub use config::*;
pub use submit_log_repository::*;
