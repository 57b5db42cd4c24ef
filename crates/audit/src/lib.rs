pub mod decision_log;
pub mod recorder;
pub mod siem;
pub mod wal;

pub use decision_log::DecisionLog;
pub use recorder::{AuditRecorder, NewAuditEvent};
pub use siem::{build_sink, run_batch_worker, SiemError, SiemOutbox, SiemQueue, SiemQueueMetrics, SiemSink, SiemSinkHandle};
pub use wal::{AuditWal, WalError};
