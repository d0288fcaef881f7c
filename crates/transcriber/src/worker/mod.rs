pub mod job;
pub mod pool;

pub use job::{JobResult, TranscriptionTask};
pub use pool::WorkerPool;
