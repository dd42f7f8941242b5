//! Validated value types shared across the pipeline.
//!
//! Values are validated on construction; there are no `From<RawType>`
//! shortcuts around the checks.

pub mod dest_dir;
pub mod entry_kind;
pub mod target;

pub use dest_dir::DestRoot;
pub use entry_kind::EntryKind;
pub use target::Target;
