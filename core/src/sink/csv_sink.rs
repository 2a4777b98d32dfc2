use crate::host_interface::{DetectionRecord, RECORD_HEADER};
use crate::prelude::{SinkError, SinkResult};
use crate::sink::RecordSink;
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// CSV file sink. The header row is written on creation, never again.
pub struct CsvSink {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    rows: usize,
}

impl CsvSink {
    pub fn create<P: AsRef<Path>>(path: P) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(RECORD_HEADER)?;
        Ok(Self {
            path,
            writer: Some(writer),
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, record: &DetectionRecord) -> SinkResult<()> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        let writer = self.writer.as_mut().ok_or(SinkError::Closed)?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            let file = writer
                .into_inner()
                .map_err(|err| SinkError::Io(err.into_error()))?;
            file.sync_all()?;
        }
        Ok(())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Reads back a file written by [`CsvSink`], checking the header first.
pub fn read_records<P: AsRef<Path>>(path: P) -> SinkResult<Vec<DetectionRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.iter().ne(RECORD_HEADER.iter().copied()) {
        return Err(SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected header {:?}", headers),
        )));
    }
    let mut records = Vec::new();
    for row in reader.deserialize::<DetectionRecord>() {
        records.push(row?);
    }
    Ok(records)
}
