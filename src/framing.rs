//! Record Framing over a Growable Buffer
//!
//! Body chunks arrive at arbitrary boundaries. The framer appends each chunk
//! to a [`GrowableBuffer`], hands every complete delimiter-terminated record
//! to the caller and consumes it, so only the trailing partial record stays
//! buffered between chunks.

use crate::buffer::{BufferStats, GrowableBuffer};
use log::debug;
use std::fmt;

/// Framing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// A partial record grew past the configured limit
    RecordTooLarge { pending: usize, limit: usize },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::RecordTooLarge { pending, limit } => write!(
                f,
                "Record too large: {} bytes pending, limit is {}",
                pending, limit
            ),
        }
    }
}

impl std::error::Error for FramingError {}

/// Splits a chunked byte stream into delimiter-terminated records
pub struct RecordFramer {
    buffer: GrowableBuffer,
    delimiter: u8,
    max_record_size: usize,
    /// Prefix of the pending bytes already known to hold no delimiter
    scanned: usize,
    /// Complete records handed out so far
    records: usize,
    /// Total bytes fed, delimiters included
    bytes_seen: usize,
}

impl RecordFramer {
    pub fn new(initial_capacity: usize, delimiter: u8, max_record_size: usize) -> Self {
        Self {
            buffer: GrowableBuffer::new(initial_capacity),
            delimiter,
            max_record_size,
            scanned: 0,
            records: 0,
            bytes_seen: 0,
        }
    }

    /// Append `chunk` and pass each record it completes to `on_record`
    /// (delimiter stripped). Returns the number of records completed.
    ///
    /// The chunk is buffered piecewise so the pending bytes never exceed
    /// `max_record_size + 1`, whatever the chunk boundaries. On error the
    /// pending partial record is dropped.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_record: F) -> Result<usize, FramingError>
    where
        F: FnMut(&[u8]),
    {
        self.bytes_seen += chunk.len();

        let mut rest = chunk;
        let mut completed = 0;
        loop {
            // Room for one more record byte than allowed, or its delimiter
            let room = (self.max_record_size + 1).saturating_sub(self.buffer.len());
            let take = room.min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            while let Some(end) = self.find_delimiter() {
                if end > self.max_record_size {
                    return Err(self.drop_pending(end));
                }
                on_record(&self.buffer.bytes()[..end]);
                self.buffer.consume(end + 1);
                self.scanned = 0;
                completed += 1;
                self.records += 1;
            }

            let pending = self.buffer.len();
            if pending > self.max_record_size {
                return Err(self.drop_pending(pending));
            }
            if rest.is_empty() {
                return Ok(completed);
            }
        }
    }

    /// End of stream: pass the trailing unterminated record, if any, to
    /// `on_record` and empty the buffer. Returns whether one was passed.
    pub fn finish<F>(&mut self, on_record: F) -> bool
    where
        F: FnOnce(&[u8]),
    {
        if self.buffer.is_empty() {
            return false;
        }

        on_record(self.buffer.bytes());
        self.buffer.reset();
        self.scanned = 0;
        self.records += 1;
        true
    }

    /// Offset of the first delimiter in the pending bytes, searching only
    /// past what earlier calls already scanned
    fn find_delimiter(&mut self) -> Option<usize> {
        let pending = self.buffer.bytes();
        match pending[self.scanned..].iter().position(|&b| b == self.delimiter) {
            Some(pos) => Some(self.scanned + pos),
            None => {
                self.scanned = pending.len();
                None
            }
        }
    }

    fn drop_pending(&mut self, pending: usize) -> FramingError {
        debug!(
            "dropping partial record of {} bytes (limit {})",
            pending, self.max_record_size
        );
        self.buffer.reset();
        self.scanned = 0;
        FramingError::RecordTooLarge {
            pending,
            limit: self.max_record_size,
        }
    }

    /// Bytes of the current partial record
    pub fn pending(&self) -> &[u8] {
        self.buffer.bytes()
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn bytes_seen(&self) -> usize {
        self.bytes_seen
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(framer: &mut RecordFramer, chunks: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for chunk in chunks {
            framer.feed(chunk, |r| out.push(r.to_vec())).unwrap();
        }
        out
    }

    #[test]
    fn test_records_split_across_chunks() {
        let mut framer = RecordFramer::new(0, b'\n', 1024);
        let records = collect(&mut framer, &[&b"alp"[..], &b"ha\nbeta\ngam"[..], &b"ma\n"[..]]);

        assert_eq!(records, vec![b"alpha".to_vec(), b"beta".to_vec(), b"gamma".to_vec()]);
        assert_eq!(framer.records(), 3);
        assert_eq!(framer.bytes_seen(), 17);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_partial_record_stays_buffered() {
        let mut framer = RecordFramer::new(0, b'\n', 1024);
        assert_eq!(framer.feed(b"one\ntw", |_| {}).unwrap(), 1);
        assert_eq!(framer.pending(), b"tw");

        let mut last = Vec::new();
        assert!(framer.finish(|r| last = r.to_vec()));
        assert_eq!(last, b"tw");
        assert_eq!(framer.records(), 2);
        assert!(!framer.finish(|_| panic!("nothing pending")));
    }

    #[test]
    fn test_empty_records() {
        let mut framer = RecordFramer::new(0, b';', 1024);
        let records = collect(&mut framer, &[&b";;x;"[..]]);
        assert_eq!(records, vec![vec![], vec![], b"x".to_vec()]);
    }

    #[test]
    fn test_record_too_large() {
        let mut framer = RecordFramer::new(0, b'\n', 8);
        framer.feed(b"short\n12345", |_| {}).unwrap();

        let err = framer.feed(b"6789", |_| {}).unwrap_err();
        assert_eq!(err, FramingError::RecordTooLarge { pending: 9, limit: 8 });
        assert!(err.to_string().contains("limit is 8"));
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_memory_tracks_pending_not_total() {
        let mut framer = RecordFramer::new(0, b'\n', 1024);
        for _ in 0..10_000 {
            framer.feed(b"0123456789\n", |_| {}).unwrap();
        }

        assert_eq!(framer.records(), 10_000);
        assert_eq!(framer.buffer_stats().size, 32);
    }

    #[test]
    fn test_oversized_record_rejected_regardless_of_chunking() {
        let mut whole = RecordFramer::new(0, b'\n', 8);
        let err = whole
            .feed(b"0123456789\n", |r| panic!("accepted {:?}", r))
            .unwrap_err();
        assert_eq!(err, FramingError::RecordTooLarge { pending: 9, limit: 8 });

        let mut split = RecordFramer::new(0, b'\n', 8);
        let err = split
            .feed(b"012345678", |r| panic!("accepted {:?}", r))
            .unwrap_err();
        assert_eq!(err, FramingError::RecordTooLarge { pending: 9, limit: 8 });
    }

    #[test]
    fn test_record_at_limit_accepted() {
        let mut framer = RecordFramer::new(0, b'\n', 8);
        let records = collect(&mut framer, &[&b"0123"[..], &b"4567\nab\n"[..]]);
        assert_eq!(records, vec![b"01234567".to_vec(), b"ab".to_vec()]);
    }

    #[test]
    fn test_rejected_chunk_does_not_grow_buffer() {
        let mut framer = RecordFramer::new(0, b'\n', 8);
        let chunk = vec![b'x'; 100_000];
        assert!(framer.feed(&chunk, |_| {}).is_err());
        assert_eq!(framer.buffer_stats().size, 32);
        assert_eq!(framer.buffer_stats().reallocations, 0);
    }

    #[test]
    fn test_long_record_in_small_chunks() {
        let mut framer = RecordFramer::new(0, b'\n', 4096);
        for _ in 0..3000 {
            assert_eq!(framer.feed(b"z", |_| {}).unwrap(), 0);
        }

        let mut record = Vec::new();
        assert_eq!(framer.feed(b"\nnext", |r| record = r.to_vec()).unwrap(), 1);
        assert_eq!(record.len(), 3000);
        assert_eq!(framer.pending(), b"next");
    }
}
