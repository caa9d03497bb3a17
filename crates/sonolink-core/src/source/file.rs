use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::{ByteSource, SourceError};

/// Byte source over any `std::io::Read`, used for raw log replay and tests.
pub struct ReadSource<R> {
    inner: R,
}

impl<R: Read> ReadSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

/// Replay source over a raw byte log on disk.
pub type RawLogSource = ReadSource<BufReader<File>>;

impl RawLogSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(ReadSource::new(BufReader::new(file)))
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SourceError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(SourceError::UnexpectedEof {
                        needed: buf.len(),
                        got: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>, SourceError> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}
