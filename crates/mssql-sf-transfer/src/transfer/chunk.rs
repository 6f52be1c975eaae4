//! In-memory CSV chunk buffer with size-triggered flushing.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::error::{Result, TransferError};

/// Default flush threshold: 100 MB of buffered CSV.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000_000;

/// Decide whether a buffer should be flushed and uploaded.
///
/// True iff the buffer is non-empty and has reached the threshold. The check
/// runs after every written row, so a buffer may overshoot the threshold by
/// at most one row.
pub fn flush_check(buf_len: usize, threshold: usize) -> bool {
    buf_len != 0 && buf_len >= threshold
}

/// Byte sink shared between the csv writer and the buffer handle, so the
/// buffered length stays observable while the writer owns the sink.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("csv buffer poisoned").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Append-only CSV buffer for one table's chunk in flight.
///
/// Records are written with default quoting (double-quote as the quote
/// character, quoted only when needed), newline terminators, no header row,
/// and no compression. Worker-local; never shared across tables.
pub struct ChunkBuffer {
    writer: csv::Writer<SharedBuf>,
    buf: SharedBuf,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        let buf = SharedBuf::default();
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(buf.clone());
        Self { writer, buf }
    }

    /// Append one row of formatted cells.
    pub fn write_record(&mut self, cells: &[String]) -> Result<()> {
        self.writer
            .write_record(cells)
            .map_err(|e| TransferError::Format(format!("error writing values to csv: {}", e)))?;
        self.writer
            .flush()
            .map_err(|e| TransferError::Format(format!("error flushing csv writer: {}", e)))?;
        Ok(())
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buf.0.lock().expect("csv buffer poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand the buffered chunk to the caller and reset the buffer.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.buf.0.lock().expect("csv buffer poisoned"))
    }
}

impl Default for ChunkBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_check_threshold_semantics() {
        assert!(!flush_check(0, 100));
        assert!(!flush_check(99, 100));
        assert!(flush_check(100, 100));
        assert!(flush_check(150, 100));
        // An empty buffer never flushes, whatever the threshold.
        assert!(!flush_check(0, 0));
    }

    #[test]
    fn test_flush_check_is_not_modulo_keyed() {
        // 200_000 is an exact multiple of 100_000 but sits below a 1 MB
        // threshold; the length check must win over any multiple-of behavior.
        assert!(!flush_check(200_000, 1_000_000));
        assert!(flush_check(1_000_001, 1_000_000));
    }

    #[test]
    fn test_plain_rows() {
        let mut buf = ChunkBuffer::new();
        buf.write_record(&["1".into(), "Ada".into()]).unwrap();
        buf.write_record(&["2".into(), "Grace".into()]).unwrap();
        assert_eq!(buf.take(), b"1,Ada\n2,Grace\n");
    }

    #[test]
    fn test_quoting_only_when_needed() {
        let mut buf = ChunkBuffer::new();
        buf.write_record(&["a,b".into(), "plain".into(), "say \"hi\"".into()])
            .unwrap();
        assert_eq!(buf.take(), b"\"a,b\",plain,\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_take_resets_buffer() {
        let mut buf = ChunkBuffer::new();
        buf.write_record(&["x".into()]).unwrap();
        assert!(!buf.is_empty());
        let first = buf.take();
        assert_eq!(first, b"x\n");
        assert!(buf.is_empty());

        buf.write_record(&["y".into()]).unwrap();
        assert_eq!(buf.take(), b"y\n");
    }

    #[test]
    fn test_len_tracks_written_bytes() {
        let mut buf = ChunkBuffer::new();
        assert_eq!(buf.len(), 0);
        buf.write_record(&["abc".into()]).unwrap();
        assert_eq!(buf.len(), 4); // "abc\n"
    }
}
