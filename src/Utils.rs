//! # Utils
//!
//! Helpers for preparing states and grids for the reaction-diffusion engine.
pub mod transforms;
