use std::io::{self, Read, Write};

use crate::errors::{Result, SyncError};

use super::ChunkStream;

/// Pulls fixed-size chunks from a reader.
///
/// Every chunk is exactly `chunk_size` bytes except the last, which holds the
/// remainder. A zero-length source yields no chunks.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    path: String,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize, path: impl Into<String>) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SyncError::config("chunk size must be greater than zero"));
        }
        Ok(Self {
            reader,
            chunk_size,
            path: path.into(),
            done: false,
        })
    }

    fn fill_chunk(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.chunk_size);
        (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill_chunk() {
            Ok(buf) if buf.is_empty() => {
                self.done = true;
                None
            }
            Ok(buf) => {
                if buf.len() < self.chunk_size {
                    self.done = true;
                }
                Some(Ok(buf))
            }
            Err(err) => {
                self.done = true;
                Some(Err(SyncError::transfer(self.path.clone(), err)))
            }
        }
    }
}

/// Drain `chunks` into `writer`, returning the byte count.
pub(crate) fn drain_into<W: Write>(
    writer: &mut W,
    chunks: ChunkStream<'_>,
    path: &str,
) -> Result<u64> {
    let mut total = 0u64;
    for chunk in chunks {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .map_err(|err| SyncError::transfer(path, err))?;
        total += chunk.len() as u64;
    }
    writer
        .flush()
        .map_err(|err| SyncError::transfer(path, err))?;
    Ok(total)
}
