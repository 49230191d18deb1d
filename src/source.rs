//! Payload source: the byte stream being transferred, cut into chunks.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// One slice of the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    /// End of stream was reached while filling this chunk; nothing follows.
    pub last: bool,
}

/// Reads the input in chunks of at most a fixed size.
///
/// A chunk is filled until it is full or the reader reports end of stream,
/// so only the final chunk can be short.  That chunk carries `last`, which
/// lets a ten-byte input travel as a single FIN fragment.
#[derive(Debug)]
pub struct PayloadSource<R> {
    reader: R,
    chunk_size: usize,
    eof: bool,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> PayloadSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size >= 1, "chunk_size must be at least 1");
        Self {
            reader,
            chunk_size,
            eof: false,
            bytes_read: 0,
        }
    }

    /// Read the next chunk.  After the last chunk, further calls return
    /// empty `last` chunks.
    pub async fn next_chunk(&mut self) -> io::Result<Chunk> {
        let mut data = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while !self.eof && filled < data.len() {
            match self.reader.read(&mut data[filled..]).await {
                Ok(0) => self.eof = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        data.truncate(filled);
        self.bytes_read += filled as u64;
        Ok(Chunk {
            data,
            last: self.eof,
        })
    }

    /// Total payload bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
