//! Application services layer.

pub mod books;
pub mod catalog;
pub mod error;
pub mod games;
pub mod images;
pub mod repos;
