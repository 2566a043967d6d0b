use super::normalizer::RawRecord;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Lazily reads dataset rows from a CSV file with a header line.
///
/// Records that cannot be decoded are skipped with a warning and counted.
/// An I/O failure ends the iteration; it is reported by [`CsvTrackSource::finish`].
pub struct CsvTrackSource<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    record: csv::StringRecord,
    rows_read: usize,
    malformed_rows: usize,
    io_error: Option<csv::Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvReadStats {
    pub rows_read: usize,
    pub malformed_rows: usize,
}

impl CsvTrackSource<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Dataset not found at {}", path.display()))?;
        Self::from_reader(file)
    }
}

impl<R: Read> CsvTrackSource<R> {
    pub fn from_reader(input: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(input);
        let headers = reader
            .headers()
            .context("Failed to read dataset header")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(CsvTrackSource {
            reader,
            headers,
            record: csv::StringRecord::new(),
            rows_read: 0,
            malformed_rows: 0,
            io_error: None,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Consumes the source, returning read statistics or the I/O error that
    /// stopped it early.
    pub fn finish(self) -> Result<CsvReadStats> {
        if let Some(e) = self.io_error {
            return Err(e).context("Dataset read aborted");
        }
        Ok(CsvReadStats {
            rows_read: self.rows_read,
            malformed_rows: self.malformed_rows,
        })
    }
}

impl<R: Read> Iterator for CsvTrackSource<R> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        if self.io_error.is_some() {
            return None;
        }
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => return None,
                Ok(true) => {
                    self.rows_read += 1;
                    return Some(
                        self.headers
                            .iter()
                            .zip(self.record.iter())
                            .map(|(h, v)| (h.as_str(), v))
                            .collect(),
                    );
                }
                Err(e) if e.is_io_error() => {
                    self.io_error = Some(e);
                    return None;
                }
                Err(e) => {
                    self.malformed_rows += 1;
                    warn!("Skipping malformed dataset row: {}", e);
                }
            }
        }
    }
}
