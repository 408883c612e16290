//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod disk_cache;
pub mod error;
pub mod http;
pub mod telemetry;
