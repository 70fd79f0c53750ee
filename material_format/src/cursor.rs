use bytes::BufMut;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("short read at offset {offset}: wanted {wanted} more bytes")]
    ShortRead { offset: usize, wanted: usize },
    #[error("invalid utf-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },
}

/// Forward-only little-endian reader over a borrowed buffer.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        self.take::<1>().map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CursorError> {
        self.take().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, CursorError> {
        self.take().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, CursorError> {
        self.take().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, CursorError> {
        self.take().map(f32::from_le_bytes)
    }

    pub fn read_bool(&mut self) -> Result<bool, CursorError> {
        self.read_u8().map(|b| b != 0)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        if self.remaining() < n {
            return Err(CursorError::ShortRead {
                offset: self.offset,
                wanted: n - self.remaining(),
            });
        }

        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    /// `u32` length followed by that many raw bytes.
    pub fn read_array(&mut self) -> Result<&'a [u8], CursorError> {
        let len = self.read_u32()?;
        self.read_bytes(len as usize)
    }

    /// An array decoded as UTF-8.
    pub fn read_string(&mut self) -> Result<String, CursorError> {
        let offset = self.offset;
        let bytes = self.read_array()?;
        std::str::from_utf8(bytes)
            .map(String::from)
            .map_err(|_| CursorError::InvalidUtf8 { offset })
    }

    pub fn read_f32_array(&mut self, n: usize) -> Result<Vec<f32>, CursorError> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_f32()?);
        }
        Ok(out)
    }
}

/// Growable little-endian writer.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, val: u8) {
        self.buf.put_u8(val);
    }

    pub fn write_u16(&mut self, val: u16) {
        self.buf.put_u16_le(val);
    }

    pub fn write_u32(&mut self, val: u32) {
        self.buf.put_u32_le(val);
    }

    pub fn write_u64(&mut self, val: u64) {
        self.buf.put_u64_le(val);
    }

    pub fn write_f32(&mut self, val: f32) {
        self.buf.put_f32_le(val);
    }

    pub fn write_bool(&mut self, val: bool) {
        self.write_u8(val as u8);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn write_array(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_array(s.as_bytes());
    }

    pub fn write_f32_array(&mut self, vals: &[f32]) {
        for val in vals {
            self.write_f32(*val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CursorError, Reader, Writer};

    #[test]
    fn int_round_trip() {
        let mut writer = Writer::new();
        writer.write_u8(0xAB);
        writer.write_u16(0x1234);
        writer.write_u32(0xDEAD_BEEF);
        writer.write_u64(0x0102_0304_0506_0708);
        let buf = writer.finish();

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 0xAB);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert!(reader.is_empty());
    }

    #[test]
    fn little_endian_layout() {
        let mut writer = Writer::new();
        writer.write_u32(1);
        assert_eq!(writer.finish(), [1, 0, 0, 0]);
    }

    #[test]
    fn string_round_trip() {
        let mut writer = Writer::new();
        writer.write_string("Hello World");
        let buf = writer.finish();
        assert_eq!(&buf[..4], [11, 0, 0, 0]);

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.read_string().unwrap(), "Hello World");
    }

    #[test]
    fn short_read_reports_offset() {
        let buf = [0u8; 2];
        let mut reader = Reader::new(&buf);
        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err,
            CursorError::ShortRead {
                offset: 0,
                wanted: 2
            }
        );
    }

    #[test]
    fn invalid_utf8() {
        let mut writer = Writer::new();
        writer.write_array(&[0xFF, 0xFE]);
        let buf = writer.finish();

        let mut reader = Reader::new(&buf);
        assert!(matches!(
            reader.read_string().unwrap_err(),
            CursorError::InvalidUtf8 { offset: 0 }
        ));
    }

    #[test]
    fn bool_is_nonzero() {
        let buf = [0, 1, 2];
        let mut reader = Reader::new(&buf);
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
    }
}
