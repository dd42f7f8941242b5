//! Concurrent fetch-extract-scan pipeline.
//!
//! A feed pushes [`Target`](crate::Target)s into a bounded queue through a
//! [`QueueProducer`]; a fixed [`WorkerPool`] pulls one target at a time and
//! hands it to a [`TargetProcessor`]. Outcomes go to a
//! [`Reporter`](crate::report::Reporter) as they finish.

pub mod context;
pub mod pool;
pub mod processor;

pub use context::PipelineContext;
pub use context::WorkerSlot;
pub use context::WorkerState;
pub use pool::QueueProducer;
pub use pool::WorkerPool;
pub use processor::SweepPipeline;
pub use processor::TargetProcessor;
