//! BubbleBook Core - Foundational types for the BubbleBook toolkit
//!
//! This crate provides the types that the generation and layout crates share:
//! - `BookError` and the `Result` alias
//! - `ContentHash` - SHA-256 content hashing for generated images

mod error;
mod hash;

pub use error::{BookError, Result};
pub use hash::ContentHash;
