//! # Examples
//!
//! Worked examples, run from `main.rs` by task number.
pub mod rd_examples;
