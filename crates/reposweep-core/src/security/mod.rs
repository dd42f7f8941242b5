//! Extraction safety policy.

pub mod path;
pub mod quota;

pub use path::canonicalize_lenient;
pub use path::is_strictly_within;
pub use path::resolve_entry_path;
pub use path::screen_entry_name;
pub use quota::ExtractionBudget;
