use alloc::{string::String, vec::Vec};

// DESERIALIZATION ERROR
// ================================================================================================

/// Errors raised while decoding a model-file byte stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeserializationError {
    #[error("unexpected end of model data")]
    UnexpectedEof,
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

// BYTE WRITER
// ================================================================================================

/// A sink for the model-file wire format.
///
/// All multi-byte integers are written big-endian fixed-width. Byte strings are framed as
/// `[i32 len][bytes]` with `-1` denoting null and `0` an empty string; int arrays as
/// `[i32 count][i32 * count]`.
pub trait ByteWriter {
    fn write_u8(&mut self, value: u8);

    fn write_bytes(&mut self, values: &[u8]);

    fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_be_bytes());
    }

    /// Writes a length-prefixed byte string; `None` is framed as length `-1`.
    fn write_byte_string(&mut self, value: Option<&[u8]>) {
        match value {
            None => self.write_i32(-1),
            Some(bytes) => {
                self.write_i32(bytes.len() as i32);
                self.write_bytes(bytes);
            },
        }
    }

    /// Writes a length-prefixed array of 32-bit integers.
    fn write_int_array(&mut self, values: &[i32]) {
        self.write_i32(values.len() as i32);
        for &value in values {
            self.write_i32(value);
        }
    }

    fn write<S: Serializable>(&mut self, value: S)
    where
        Self: Sized,
    {
        value.write_into(self)
    }
}

impl ByteWriter for Vec<u8> {
    fn write_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn write_bytes(&mut self, values: &[u8]) {
        self.extend_from_slice(values);
    }
}

// BYTE READER
// ================================================================================================

/// A source for the model-file wire format; the mirror of [ByteWriter].
pub trait ByteReader {
    fn read_u8(&mut self) -> Result<u8, DeserializationError>;

    fn read_slice(&mut self, len: usize) -> Result<&[u8], DeserializationError>;

    /// Returns true if at least `num_bytes` remain unread.
    fn has_more_bytes(&self, num_bytes: usize) -> bool;

    fn read_u16(&mut self) -> Result<u16, DeserializationError> {
        let bytes = self.read_slice(2)?;
        Ok(u16::from_be_bytes(bytes.try_into().expect("2-byte slice")))
    }

    fn read_u32(&mut self) -> Result<u32, DeserializationError> {
        let bytes = self.read_slice(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn read_u64(&mut self) -> Result<u64, DeserializationError> {
        let bytes = self.read_slice(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().expect("8-byte slice")))
    }

    fn read_i32(&mut self) -> Result<i32, DeserializationError> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads a length-prefixed byte string; length `-1` decodes as `None`.
    fn read_byte_string(&mut self) -> Result<Option<Vec<u8>>, DeserializationError> {
        let len = self.read_i32()?;
        match len {
            -1 => Ok(None),
            len if len < 0 => {
                Err(DeserializationError::InvalidValue(format!("negative string length {len}")))
            },
            len => Ok(Some(self.read_slice(len as usize)?.to_vec())),
        }
    }

    /// Reads a length-prefixed array of 32-bit integers.
    fn read_int_array(&mut self) -> Result<Vec<i32>, DeserializationError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(DeserializationError::InvalidValue(format!(
                "negative array length {count}"
            )));
        }
        let mut values = Vec::with_capacity(count as usize);
        for _ in 0..count {
            values.push(self.read_i32()?);
        }
        Ok(values)
    }
}

/// A [ByteReader] over an in-memory byte slice.
pub struct SliceReader<'a> {
    source: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self { source, pos: 0 }
    }

    /// Returns the number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl ByteReader for SliceReader<'_> {
    fn read_u8(&mut self) -> Result<u8, DeserializationError> {
        let byte = *self.source.get(self.pos).ok_or(DeserializationError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, len: usize) -> Result<&[u8], DeserializationError> {
        let end = self.pos.checked_add(len).ok_or(DeserializationError::UnexpectedEof)?;
        if end > self.source.len() {
            return Err(DeserializationError::UnexpectedEof);
        }
        let slice = &self.source[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn has_more_bytes(&self, num_bytes: usize) -> bool {
        self.pos + num_bytes <= self.source.len()
    }
}

// SERIALIZABLE / DESERIALIZABLE
// ================================================================================================

pub trait Serializable {
    fn write_into<W: ByteWriter>(&self, target: &mut W);

    fn to_bytes(&self) -> Vec<u8> {
        let mut target = Vec::new();
        self.write_into(&mut target);
        target
    }
}

pub trait Deserializable: Sized {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError>;

    fn read_from_bytes(bytes: &[u8]) -> Result<Self, DeserializationError> {
        Self::read_from(&mut SliceReader::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut target = Vec::new();
        target.write_u32(0x0102_0304);
        target.write_i32(-1);
        assert_eq!(target, [1, 2, 3, 4, 0xff, 0xff, 0xff, 0xff]);

        let mut source = SliceReader::new(&target);
        assert_eq!(source.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(source.read_i32().unwrap(), -1);
        assert!(!source.has_more_bytes(1));
    }

    #[test]
    fn byte_string_roundtrip() {
        let mut target = Vec::new();
        target.write_byte_string(Some(b"abc"));
        target.write_byte_string(None);
        target.write_byte_string(Some(b""));

        let mut source = SliceReader::new(&target);
        assert_eq!(source.read_byte_string().unwrap().as_deref(), Some(b"abc".as_slice()));
        assert_eq!(source.read_byte_string().unwrap(), None);
        assert_eq!(source.read_byte_string().unwrap().as_deref(), Some(b"".as_slice()));
    }

    #[test]
    fn int_array_roundtrip() {
        let values = [0, -7, i32::MAX, i32::MIN];
        let mut target = Vec::new();
        target.write_int_array(&values);

        let mut source = SliceReader::new(&target);
        assert_eq!(source.read_int_array().unwrap(), values);
    }

    #[test]
    fn truncated_read_fails() {
        let mut target = Vec::new();
        target.write_byte_string(Some(b"abcdef"));
        let mut source = SliceReader::new(&target[..6]);
        assert_eq!(source.read_byte_string(), Err(DeserializationError::UnexpectedEof));
    }
}
