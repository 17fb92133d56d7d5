//! Append-only record sinks

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::{ExportError, FlowRecord, CSV_FIELDS};

/// Append-only destination for enriched records
pub trait RecordSink: Send {
    /// Append one record. A failure here is fatal for the pipeline.
    fn write(&mut self, record: &FlowRecord) -> Result<(), ExportError>;

    /// Flush buffered output to the underlying medium.
    fn flush(&mut self) -> Result<(), ExportError>;
}

/// CSV sink over any writer. The header row is emitted when the sink
/// is opened, so even an empty output file carries the schema.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create a CSV file sink, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ExportError> {
        let file = File::create(path.as_ref()).map_err(|source| ExportError::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_writer(file)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W) -> Result<Self, ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(CSV_FIELDS)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> Result<W, ExportError> {
        self.writer.into_inner().map_err(|e| {
            ExportError::Flush(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })
    }
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &FlowRecord) -> Result<(), ExportError> {
        self.writer.serialize(record)?;
        // Records are flushed eagerly so a rotation or crash loses nothing
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExportError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::FlowDirection;

    fn record() -> FlowRecord {
        FlowRecord {
            source_ip: "192.168.1.5".to_string(),
            destination_ip: "8.8.8.8".to_string(),
            source_port: 50000,
            destination_port: 443,
            protocol: "TCP".to_string(),
            packet_size: 100,
            inter_arrival_time: 0.0,
            payload_size: 60,
            flow_duration: 0.0,
            total_packets: 1,
            total_bytes: 100,
            flow_direction: FlowDirection::Outbound,
            session_duration: 0.0,
            session_count: 1,
            mean_packet_size: 100.0,
            variance_packet_size: 0.0,
            entropy: 0.0,
            access_patterns: "192.168.1.5->8.8.8.8:443".to_string(),
            usage_frequency: 0.0,
            temporal_patterns: "2024-01-01 00:00:00".to_string(),
            country: "Unknown".to_string(),
            region: "Unknown".to_string(),
            city: "Unknown".to_string(),
            application_data: "Unknown".to_string(),
            behavioral_pattern: "Normal".to_string(),
            network_context: "Normal".to_string(),
        }
    }

    #[test]
    fn test_header_written_at_open() {
        let sink = CsvSink::from_writer(Vec::new()).unwrap();
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert_eq!(out.trim_end(), CSV_FIELDS.join(","));
    }

    #[test]
    fn test_header_and_single_row() {
        let mut sink = CsvSink::from_writer(Vec::new()).unwrap();
        sink.write(&record()).unwrap();
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();

        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), CSV_FIELDS.join(","));

        let row = lines.next().unwrap();
        assert!(row.starts_with("192.168.1.5,8.8.8.8,50000,443,TCP,100,"));
        assert!(row.contains("outbound"));
        assert!(row.contains("192.168.1.5->8.8.8.8:443"));
        assert!(lines.next().is_none());
    }
}
