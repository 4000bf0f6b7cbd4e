//! Forward-only lookahead buffer over a byte source.
//!
//! `SourceBuffer` owns a reader and keeps an in-memory window of bytes that
//! have been fetched but not yet consumed. Lookahead (`starts_with`,
//! `index_any_of`) grows the window as needed; consumption (`read`,
//! `discard`) removes a prefix and is irreversible. One instance is created
//! per input file and dropped when the file has been fully consumed.

use std::fmt;
use std::io::Read;

use crate::error::{Result, VmgError};

/// Minimum number of bytes fetched from the source per refill.
const MIN_CHUNK: usize = 1024;

/// When a refill falls short of `MIN_CHUNK`, top the window up this far past
/// its current length instead, to amortize small lookaheads.
const TOPUP: usize = 10 * 1024;

/// Growable lookahead window over an exclusively owned byte source.
///
/// The window always holds the unconsumed bytes starting at `position()`.
/// Bytes are read from the source at most once; the buffer never rewinds.
pub struct SourceBuffer<R: Read> {
    source: R,
    window: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> SourceBuffer<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            window: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Absolute count of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True only once the window is drained and the source has no more
    /// bytes. Probes the source with a one-byte fill when the window is
    /// empty, so a fully consumed input reports exhaustion even if the
    /// final read stopped exactly at the end.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        if !self.window.is_empty() {
            return Ok(false);
        }
        if !self.eof {
            self.fill(1)?;
        }
        Ok(self.window.is_empty() && self.eof)
    }

    /// Whether the window content at `offset` begins with `literal`.
    /// Returns false (not an error) when fewer bytes are available.
    pub fn starts_with(&mut self, literal: &str, offset: usize) -> Result<bool> {
        let needle = literal.as_bytes();
        self.fill(offset + needle.len())?;
        if self.window.len() < offset + needle.len() {
            return Ok(false);
        }
        Ok(&self.window[offset..offset + needle.len()] == needle)
    }

    /// Index (relative to `offset`) of the first occurrence of `byte`, or
    /// `None` if the source is exhausted without a match.
    pub fn index_of(&mut self, byte: u8, offset: usize) -> Result<Option<usize>> {
        self.index_any_of(&[byte], offset)
    }

    /// Index (relative to `offset`) of the first byte contained in `set`,
    /// or `None` if the source is exhausted without a match.
    pub fn index_any_of(&mut self, set: &[u8], offset: usize) -> Result<Option<usize>> {
        let mut index = 0;
        loop {
            self.fill(offset + index + 1)?;
            if offset + index + 1 > self.window.len() {
                return Ok(None);
            }
            if set.contains(&self.window[offset + index]) {
                return Ok(Some(index));
            }
            index += 1;
        }
    }

    /// Consume and return one line including its terminator bytes. CRLF is
    /// a single two-byte terminator and is never split. When no terminator
    /// remains before the end of input, returns everything left (with no
    /// terminator).
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let found = match self.index_any_of(b"\r\n", 0)? {
            Some(i) => i,
            None => return self.read_all(),
        };
        if self.starts_with("\r\n", found)? {
            self.read(found + 2)
        } else {
            self.read(found + 1)
        }
    }

    /// Consume and return exactly one line terminator (`\r\n` preferred
    /// over lone `\r` or `\n`) anchored at the current position.
    pub fn read_newline(&mut self) -> Result<Vec<u8>> {
        if self.starts_with("\r\n", 0)? {
            self.read(2)
        } else if self.starts_with("\r", 0)? || self.starts_with("\n", 0)? {
            self.read(1)
        } else {
            Err(VmgError::Structural {
                expected: "line break".to_string(),
                pos: self.pos,
            })
        }
    }

    /// Consume and return everything remaining in the source.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        while !self.eof {
            let target = self.window.len() + MIN_CHUNK;
            self.fill(target)?;
        }
        let out = std::mem::take(&mut self.window);
        self.pos += out.len();
        Ok(out)
    }

    /// Consume and return `min(n, available)` bytes.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        self.fill(n)?;
        let take = n.min(self.window.len());
        let out = self.window[..take].to_vec();
        self.discard(take)?;
        Ok(out)
    }

    /// Same matching rule as [`read_newline`](Self::read_newline), but the
    /// terminator is dropped instead of returned.
    pub fn discard_newline(&mut self) -> Result<()> {
        if self.starts_with("\r\n", 0)? {
            self.discard(2)
        } else if self.starts_with("\r", 0)? || self.starts_with("\n", 0)? {
            self.discard(1)
        } else {
            Err(VmgError::Structural {
                expected: "line break".to_string(),
                pos: self.pos,
            })
        }
    }

    /// Drop the first `n` bytes of the window. Asking for more than the
    /// source can supply is a caller bug and reported as an internal error.
    pub fn discard(&mut self, n: usize) -> Result<()> {
        self.fill(n)?;
        if n > self.window.len() {
            return Err(VmgError::Internal { pos: self.pos });
        }
        self.window.drain(..n);
        self.pos += n;
        Ok(())
    }

    /// Grow the window until it holds at least `want` bytes or the source
    /// is exhausted. Never shrinks; never re-reads bytes already buffered.
    fn fill(&mut self, want: usize) -> Result<()> {
        if self.window.len() >= want {
            return Ok(());
        }
        let mut target = want;
        if target - self.window.len() < MIN_CHUNK {
            target = self.window.len() + TOPUP;
        }
        let mut len = self.window.len();
        self.window.resize(target, 0);
        while len < target {
            let n = self.source.read(&mut self.window[len..target])?;
            if n == 0 {
                self.eof = true;
                break;
            }
            len += n;
        }
        self.window.truncate(len);
        Ok(())
    }
}

impl<R: Read> fmt::Debug for SourceBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview = &self.window[..self.window.len().min(32)];
        write!(
            f,
            "SourceBuffer(pos={}, window={:?}...)",
            self.pos,
            String::from_utf8_lossy(preview)
        )
    }
}
