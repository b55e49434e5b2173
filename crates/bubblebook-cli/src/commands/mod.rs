//! CLI command implementations

pub mod book;
pub mod check;
pub mod generate;
pub mod init;
pub mod prompts;
