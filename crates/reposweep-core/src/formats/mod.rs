//! Archive format implementations.

pub mod traits;
pub mod zip;

pub use traits::ArchiveSource;
pub use traits::SourceEntry;
pub use self::zip::ZipSource;
