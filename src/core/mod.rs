//! Core engine logic: targets, parsing, scheduling, evaluation.

pub mod config;
pub mod error;
pub mod executor;
pub mod parser;
pub mod resolver;
pub mod rewrite;
pub mod types;
