//! Hardened archive extraction.

pub mod engine;

pub use engine::ExtractionEngine;

pub(crate) use engine::create_private_dir;
