//! Derivo - derivative image cache
//!
//! Serves resized, cropped and watermarked variants of stored originals,
//! generating each one on first request and caching it on disk.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod distribute;
pub mod error;
pub mod http;
pub mod package;
pub mod source;
pub mod transform;
pub mod ui;

pub use error::{DerivoError, DerivoResult};
