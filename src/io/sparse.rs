//! Sparse writes for decoded output.
//!
//! Decoded streams often contain long runs of zero bytes (disk images, VM
//! snapshots, pre-allocated databases). Instead of writing those zeros, the
//! writer counts them and converts each run into a relative `seek`, letting
//! the filesystem materialize a hole. The byte stream read back from the
//! file is identical to the byte stream written; only the on-disk block
//! usage differs.
//!
//! Buffers are scanned one native word at a time in 32 KiB segments; a
//! trailing fragment shorter than a word is scanned per byte. Pending skips
//! accumulate across writes in [`SparseWriter::stored_skips`] and are capped
//! at 1 GiB per seek so the offset arithmetic stays comfortably inside
//! `i64`. [`SparseWriter::finish`] must run after the last write: a file
//! cannot end in a hole, so the final skipped byte is written explicitly to
//! pin the file length.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::mem;

/// Scan granularity: zero-run detection restarts every 32 KiB.
const SEGMENT_SIZE: usize = 32 * 1024;

/// Native word size used for the fast zero scan.
const WORD: usize = mem::size_of::<usize>();

/// Largest single relative seek issued while draining pending skips.
const MAX_SEEK: u64 = 1 << 30;

/// A `File` writer that turns zero runs into holes.
pub struct SparseWriter<'a> {
    file: &'a mut File,
    enabled: bool,
    stored_skips: u64,
}

impl<'a> SparseWriter<'a> {
    /// Wraps `file`. With `enabled == false` every write is a plain
    /// `write_all` and `finish` is a no-op.
    pub fn new(file: &'a mut File, enabled: bool) -> Self {
        SparseWriter {
            file,
            enabled,
            stored_skips: 0,
        }
    }

    /// Skips currently pending (trailing zeros seen but not yet realized).
    pub fn pending(&self) -> u64 {
        self.stored_skips
    }

    /// Writes `buf`, converting leading-zero word runs into pending skips
    /// realized as seeks once non-zero data arrives.
    pub fn write_block(&mut self, buf: &[u8]) -> io::Result<()> {
        if !self.enabled {
            self.file.write_all(buf)?;
            return Ok(());
        }

        // Cap a pending run before it grows past what one seek can express.
        if self.stored_skips > MAX_SEEK {
            self.file.seek(SeekFrom::Current(MAX_SEEK as i64))?;
            self.stored_skips -= MAX_SEEK;
        }

        let words_total = buf.len() / WORD;
        let mut word_idx = 0usize;
        while word_idx < words_total {
            let seg_words = (SEGMENT_SIZE / WORD).min(words_total - word_idx);

            // Count leading all-zero words in this segment.
            let mut zeros = 0usize;
            while zeros < seg_words {
                let start = (word_idx + zeros) * WORD;
                let word =
                    usize::from_ne_bytes(buf[start..start + WORD].try_into().unwrap());
                if word != 0 {
                    break;
                }
                zeros += 1;
            }
            self.stored_skips += (zeros * WORD) as u64;

            if zeros != seg_words {
                // Non-zero data: realize the pending hole, then write the
                // rest of the segment.
                self.file
                    .seek(SeekFrom::Current(self.stored_skips as i64))
                    .map_err(|e| seek_error(e))?;
                self.stored_skips = 0;
                let start = (word_idx + zeros) * WORD;
                let end = (word_idx + seg_words) * WORD;
                self.file.write_all(&buf[start..end])?;
            }
            word_idx += seg_words;
        }

        // Trailing bytes that do not fill a whole word.
        let rest = &buf[words_total * WORD..];
        if !rest.is_empty() {
            let zeros = rest.iter().take_while(|&&b| b == 0).count();
            self.stored_skips += zeros as u64;
            if zeros < rest.len() {
                self.file
                    .seek(SeekFrom::Current(self.stored_skips as i64))
                    .map_err(|e| seek_error(e))?;
                self.stored_skips = 0;
                self.file.write_all(&rest[zeros..])?;
            }
        }

        Ok(())
    }

    /// Writes `buf` exactly as-is, bypassing zero-run detection. Only valid
    /// while no skips are pending; used for pass-through prefixes.
    pub fn write_direct(&mut self, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(self.stored_skips, 0);
        self.file.write_all(buf)
    }

    /// Realizes any trailing hole. Seeks to one byte before the end and
    /// writes a single zero, forcing the filesystem to record the final
    /// length; the skipped region reads back as zeros.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.stored_skips > 0 {
            self.file
                .seek(SeekFrom::Current((self.stored_skips - 1) as i64))
                .map_err(|e| seek_error(e))?;
            self.file.write_all(&[0u8])?;
            self.stored_skips = 0;
        }
        Ok(())
    }
}

fn seek_error(e: io::Error) -> io::Error {
    io::Error::new(e.kind(), format!("sparse skip error (try --no-sparse): {}", e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_back(file: &mut File) -> Vec<u8> {
        let mut out = Vec::new();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn plain_data_passes_through() {
        let mut f = tempfile::tempfile().unwrap();
        let data: Vec<u8> = (1u8..=32).collect();
        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&data).unwrap();
        assert_eq!(w.pending(), 0);
        w.finish().unwrap();
        assert_eq!(read_back(&mut f), data);
    }

    #[test]
    fn all_zeros_accumulate_without_writing() {
        let mut f = tempfile::tempfile().unwrap();
        let zeros = vec![0u8; 128];
        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&zeros).unwrap();
        assert_eq!(w.pending(), 128);
        // Nothing has touched the file yet.
        assert_eq!(f.seek(SeekFrom::Current(0)).unwrap(), 0);
    }

    #[test]
    fn finish_pins_the_file_length() {
        let mut f = tempfile::tempfile().unwrap();
        let zeros = vec![0u8; 100];
        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&zeros).unwrap();
        w.finish().unwrap();
        let data = read_back(&mut f);
        assert_eq!(data.len(), 100);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn finish_without_pending_is_noop() {
        let mut f = tempfile::tempfile().unwrap();
        let mut w = SparseWriter::new(&mut f, true);
        w.finish().unwrap();
        assert_eq!(read_back(&mut f).len(), 0);
    }

    #[test]
    fn zeros_then_data_round_trip() {
        let mut f = tempfile::tempfile().unwrap();
        let mut buf = vec![0u8; 3 * WORD];
        buf.extend_from_slice(&[9u8; 16]);
        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&buf).unwrap();
        assert_eq!(w.pending(), 0);
        w.finish().unwrap();
        assert_eq!(read_back(&mut f), buf);
    }

    #[test]
    fn hole_in_the_middle_round_trip() {
        let mut f = tempfile::tempfile().unwrap();
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xAB; 40]);
        buf.extend_from_slice(&vec![0u8; 64 * 1024]); // spans two segments
        buf.extend_from_slice(&[0xCD; 40]);

        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&buf).unwrap();
        w.finish().unwrap();
        assert_eq!(read_back(&mut f), buf);
    }

    #[test]
    fn unaligned_tail_with_zero_prefix() {
        let mut f = tempfile::tempfile().unwrap();
        // Length deliberately not a multiple of the word size.
        let mut buf = vec![0u8; WORD + 3];
        buf.push(0x5A);
        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&buf).unwrap();
        w.finish().unwrap();
        assert_eq!(read_back(&mut f), buf);
    }

    #[test]
    fn split_across_multiple_writes() {
        let mut f = tempfile::tempfile().unwrap();
        let mut w = SparseWriter::new(&mut f, true);
        w.write_block(&vec![0u8; 50]).unwrap();
        w.write_block(&[1, 2, 3]).unwrap();
        w.write_block(&vec![0u8; 20]).unwrap();
        w.finish().unwrap();

        let mut expected = vec![0u8; 50];
        expected.extend_from_slice(&[1, 2, 3]);
        expected.extend_from_slice(&vec![0u8; 20]);
        assert_eq!(read_back(&mut f), expected);
    }

    #[test]
    fn disabled_mode_writes_everything() {
        let mut f = tempfile::tempfile().unwrap();
        let zeros = vec![0u8; 64];
        let mut w = SparseWriter::new(&mut f, false);
        w.write_block(&zeros).unwrap();
        assert_eq!(w.pending(), 0);
        w.finish().unwrap();
        assert_eq!(read_back(&mut f).len(), 64);
    }
}
