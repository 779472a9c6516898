//! Derivative cache
//!
//! Derivatives live as flat files named `{source_id}-{package}.{ext}` in the
//! images directory. A file's existence is the cache entry; there is no
//! index and no freshness check beyond it.
//!
//! # Entry States
//!
//! | State | On disk | Request behaviour |
//! |-------|---------|-------------------|
//! | Absent | nothing | start a generation |
//! | Generating | `*.part` sibling only | join the running generation |
//! | Present | complete file | serve it |
//!
//! Invalidation and purge move entries back to Absent.

pub mod invalidate;
pub mod path;
pub mod resolver;

pub use invalidate::{Invalidator, PurgeReport, SourceLifecycle};
pub use path::{DerivativeKey, PathResolver};
pub use resolver::CacheResolver;
