//! # lzmaviz Core
//!
//! Core components for the lzmaviz heat-tracing LZMA decoder.
//!
//! This crate provides the byte-level plumbing underneath the decoder:
//!
//! - [`source`]: counting one-byte-at-a-time input source
//! - [`window`]: sliding dictionary window paired with a linear output buffer
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! lzmaviz is a layered workspace:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ lzmaviz-cli                                         │
//! │     argument parsing, gradients, ANSI rendering     │
//! ├─────────────────────────────────────────────────────┤
//! │ lzmaviz-lzma                                        │
//! │     range coder, probability models, LZMA decoder,  │
//! │     per-byte information-cost accounting            │
//! ├─────────────────────────────────────────────────────┤
//! │ lzmaviz-core (this crate)                           │
//! │     ByteSource, OutputWindow, error types           │
//! └─────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod source;
pub mod window;

// Re-exports for convenience
pub use error::{LzmaVizError, Result};
pub use source::ByteSource;
pub use window::OutputWindow;
