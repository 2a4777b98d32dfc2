pub mod csv_sink;

use crate::host_interface::DetectionRecord;
use crate::prelude::SinkResult;

pub use csv_sink::{read_records, CsvSink};

/// Append-only store for labeled detection rows.
///
/// Rows keep the order `append` was called in. `close` flushes first and
/// may be called more than once; only the first call does any work.
pub trait RecordSink {
    fn append(&mut self, record: &DetectionRecord) -> SinkResult<()>;
    fn flush(&mut self) -> SinkResult<()>;
    fn close(&mut self) -> SinkResult<()>;
}
