pub mod batch;
pub mod outbox;
pub mod queue;
pub mod sink;

pub use batch::{run_batch_worker, SiemSinkHandle};
pub use outbox::{OutboxEntry, OutboxError, SiemOutbox};
pub use queue::{SiemQueue, SiemQueueMetrics};
pub use sink::{build_sink, SiemError, SiemSink};
