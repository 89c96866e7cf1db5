//! ## larm-entry::cursor
//! **Bounds-checked reader over a byte slice**
//!
//! Every advance is validated against the slice end before a sub-slice is
//! handed out, so section lookups driven by untrusted header lengths can
//! never read past the record.

use crate::error::EntryError;

/// Forward-only little-endian reader.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the next `len` bytes and advances past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], EntryError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(EntryError::InsufficientData)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], EntryError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, EntryError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, EntryError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, EntryError> {
        self.read_array().map(u32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let data = [0x01, 0xF0, 0x0F, 0x78, 0x56, 0x34, 0x12];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16().unwrap(), 0x0FF0);
        assert_eq!(cursor.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(cursor.position(), data.len());
        assert_eq!(cursor.take(1), Err(EntryError::InsufficientData));
    }

    #[test]
    fn take_past_end_fails_without_advancing() {
        let data = [1, 2, 3];
        let mut cursor = ByteCursor::new(&data);
        cursor.take(2).unwrap();
        assert_eq!(cursor.take(2), Err(EntryError::InsufficientData));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.take(1).unwrap(), &[3]);
    }

    #[test]
    fn huge_length_does_not_overflow() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data);
        cursor.take(1).unwrap();
        assert_eq!(cursor.take(usize::MAX), Err(EntryError::InsufficientData));
    }
}
