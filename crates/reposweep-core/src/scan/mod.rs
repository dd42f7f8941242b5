//! Static analysis of extracted repositories.

pub mod invoker;
pub mod output;

pub use invoker::CommandScanner;
pub use invoker::Scanner;
pub use output::Finding;
pub use output::ScanOutput;
pub use output::ScanResult;
