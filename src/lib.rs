//! Curio: a small catalog of books and games whose cover images are
//! transcoded on upload, stored durably in Postgres, and served through a
//! self-repairing disk cache.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
