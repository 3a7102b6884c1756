//! Doru - pharmacy locator backend
//!
//! Drugstores register, publish their opening hours and stock; customers
//! search drugstores by name, address or the drugs they carry.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod schedule;
pub mod services;

pub use config::Config;
pub use db::Database;
pub use error::AppError;
