//! Domain layer types and invariants.

pub mod assets;
pub mod books;
pub mod entities;
pub mod error;
mod fields;
pub mod games;
pub mod slug;
