use super::error::FrameError;

pub struct FrameReader<'a> {
    frame: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(frame: &'a [u8]) -> Self {
        Self { frame }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), FrameError> {
        if self.frame.len() < needed {
            return Err(FrameError::TooShort {
                needed,
                actual: self.frame.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, FrameError> {
        self.frame
            .get(offset)
            .copied()
            .ok_or(FrameError::TooShort {
                needed: offset + 1,
                actual: self.frame.len(),
            })
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], FrameError> {
        self.frame
            .get(range.clone())
            .ok_or(FrameError::TooShort {
                needed: range.end,
                actual: self.frame.len(),
            })
    }

    pub fn read_u32_le(&self, range: std::ops::Range<usize>) -> Result<u32, FrameError> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != 4 {
            return Err(FrameError::TooShort {
                needed: 4,
                actual: bytes.len(),
            });
        }
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32_le(&self, range: std::ops::Range<usize>) -> Result<f32, FrameError> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != 4 {
            return Err(FrameError::TooShort {
                needed: 4,
                actual: bytes.len(),
            });
        }
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
