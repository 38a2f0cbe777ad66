//! Fixed-size in-memory page with typed accessors.
//!
//! Integers are 4-byte big-endian. Strings and byte arrays are stored as a
//! 4-byte length followed by the raw bytes.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{DbError, DbResult};

const INT_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Creates a zero-filled page of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Wraps an existing byte vector, e.g. a log record.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: bytes.into_boxed_slice(),
        }
    }

    /// Number of bytes needed to store a string of `strlen` bytes.
    pub fn max_length(strlen: usize) -> usize {
        INT_SIZE + strlen
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_vec()
    }

    pub fn get_int(&self, offset: usize) -> DbResult<i32> {
        let bytes = self.slice(offset, INT_SIZE)?;
        Ok(BigEndian::read_i32(bytes))
    }

    pub fn set_int(&mut self, offset: usize, value: i32) -> DbResult<()> {
        let bytes = self.slice_mut(offset, INT_SIZE)?;
        BigEndian::write_i32(bytes, value);
        Ok(())
    }

    pub fn get_bytes(&self, offset: usize) -> DbResult<&[u8]> {
        let len = self.get_len(offset)?;
        self.slice(offset + INT_SIZE, len)
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> DbResult<()> {
        // Check the whole span first so a failed write leaves the page intact.
        self.slice(offset, Self::max_length(bytes.len()))?;
        let len = i32::try_from(bytes.len()).map_err(|_| self.overflow(offset, bytes.len()))?;
        self.set_int(offset, len)?;
        self.slice_mut(offset + INT_SIZE, bytes.len())?
            .copy_from_slice(bytes);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> DbResult<String> {
        let bytes = self.get_bytes(offset)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DbError::InvalidString { offset })
    }

    pub fn set_string(&mut self, offset: usize, value: &str) -> DbResult<()> {
        self.set_bytes(offset, value.as_bytes())
    }

    fn get_len(&self, offset: usize) -> DbResult<usize> {
        let len = self.get_int(offset)?;
        usize::try_from(len).map_err(|_| self.overflow(offset, INT_SIZE))
    }

    fn slice(&self, offset: usize, len: usize) -> DbResult<&[u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(&self.data[offset..end]),
            _ => Err(self.overflow(offset, len)),
        }
    }

    fn slice_mut(&mut self, offset: usize, len: usize) -> DbResult<&mut [u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(&mut self.data[offset..end]),
            _ => Err(self.overflow(offset, len)),
        }
    }

    fn overflow(&self, offset: usize, len: usize) -> DbError {
        DbError::PageOverflow {
            offset,
            len,
            size: self.data.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_values_at_offsets() {
        let mut page = Page::new(128);
        page.set_int(0, 5).unwrap();
        page.set_int(60, -42).unwrap();
        page.set_bytes(10, &[1, 2]).unwrap();
        page.set_string(100, "toto").unwrap();

        assert_eq!(page.get_int(0).unwrap(), 5);
        assert_eq!(page.get_int(60).unwrap(), -42);
        assert_eq!(page.get_bytes(10).unwrap(), &[1, 2]);
        assert_eq!(page.get_string(100).unwrap(), "toto");
    }

    #[test]
    fn test_big_endian_layout() {
        let mut page = Page::new(16);
        page.set_int(0, 0x0102_0304).unwrap();
        assert_eq!(&page.contents()[..4], &[1, 2, 3, 4]);

        page.set_string(4, "ab").unwrap();
        assert_eq!(&page.contents()[4..10], &[0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut page = Page::new(16);
        assert!(matches!(
            page.get_int(13),
            Err(DbError::PageOverflow { offset: 13, len: 4, size: 16 })
        ));
        assert!(page.set_int(usize::MAX, 1).is_err());

        // 4-byte prefix + 13 bytes does not fit; the page must stay untouched.
        assert!(page.set_string(0, "thirteen char").is_err());
        assert_eq!(page.get_int(0).unwrap(), 0);

        // A garbage length prefix is reported, not followed.
        page.set_int(0, 1000).unwrap();
        assert!(page.get_bytes(0).is_err());
        page.set_int(0, -1).unwrap();
        assert!(page.get_string(0).is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut page = Page::new(16);
        page.set_bytes(0, &[0xff, 0xfe]).unwrap();
        assert!(matches!(
            page.get_string(0),
            Err(DbError::InvalidString { offset: 0 })
        ));
    }

    #[test]
    fn test_from_bytes_and_max_length() {
        let page = Page::from_bytes(vec![0, 0, 0, 7]);
        assert_eq!(page.size(), 4);
        assert_eq!(page.get_int(0).unwrap(), 7);
        assert_eq!(Page::max_length(5), 9);
        assert_eq!(page.into_bytes(), vec![0, 0, 0, 7]);
    }
}
