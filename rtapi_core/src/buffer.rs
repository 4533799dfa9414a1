//! Fixed-capacity byte arena with a separate cursor.
//!
//! A [`Buffer`] owns zero-initialised storage whose size never changes.
//! [`Cursor`]s are lightweight views over that storage carrying only an
//! offset. Every `put_*`/`get_*` either moves the offset by exactly the
//! encoded width and succeeds, or leaves it untouched and fails.
//!
//! ## Wire layout
//! Native-endian fixed-width fields back to back, strings as NUL-terminated
//! byte runs. There is no type tag: the reader must know the schema.

use core::ffi::{c_int, c_long};
use rtapi_common::error::{RtapiError, RtapiResult};

/// Owned, zero-initialised, fixed-capacity storage.
#[derive(Debug, Clone)]
pub struct Buffer {
    storage: Box<[u8]>,
}

impl Buffer {
    /// Allocate `capacity` zeroed bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
        }
    }

    /// Fixed capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Whole storage.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage
    }

    /// Read cursor at offset 0.
    pub fn cursor(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.storage)
    }

    /// Write cursor at offset 0.
    pub fn cursor_mut(&mut self) -> Cursor<&mut [u8]> {
        Cursor::new(&mut self.storage)
    }

    /// Zero the storage.
    pub fn clear(&mut self) {
        self.storage.fill(0);
    }
}

/// Position within a borrowed byte region.
#[derive(Debug)]
pub struct Cursor<B> {
    buf: B,
    offset: usize,
}

impl<B: AsRef<[u8]>> Cursor<B> {
    /// Cursor at offset 0 over `buf`.
    pub fn new(buf: B) -> Self {
        Self { buf, offset: 0 }
    }

    /// Current offset.
    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Move to `pos`; `pos == capacity` is allowed.
    pub fn set_position(&mut self, pos: usize) -> RtapiResult<()> {
        if pos > self.capacity() {
            return Err(RtapiError::InvalidArgument("cursor position beyond capacity"));
        }
        self.offset = pos;
        Ok(())
    }

    /// Back to offset 0.
    #[inline]
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    /// Size of the underlying region.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Bytes between the offset and the end.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset
    }
}

impl<'a> Cursor<&'a mut [u8]> {
    fn put_bytes(&mut self, bytes: &[u8]) -> RtapiResult<()> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(RtapiError::OutOfSpace {
                needed: bytes.len(),
                remaining,
            });
        }
        let end = self.offset + bytes.len();
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    /// Write one byte.
    pub fn put_u8(&mut self, value: u8) -> RtapiResult<()> {
        self.put_bytes(&[value])
    }

    /// Write a native `int`.
    pub fn put_int(&mut self, value: c_int) -> RtapiResult<()> {
        self.put_bytes(&value.to_ne_bytes())
    }

    /// Write a native `long`.
    pub fn put_long(&mut self, value: c_long) -> RtapiResult<()> {
        self.put_bytes(&value.to_ne_bytes())
    }

    /// Write a 32-bit float.
    pub fn put_f32(&mut self, value: f32) -> RtapiResult<()> {
        self.put_bytes(&value.to_ne_bytes())
    }

    /// Write a 64-bit float.
    pub fn put_f64(&mut self, value: f64) -> RtapiResult<()> {
        self.put_bytes(&value.to_ne_bytes())
    }

    /// Write a C string: the bytes before the first NUL, then a NUL.
    pub fn put_str<S: AsRef<[u8]> + ?Sized>(&mut self, s: &S) -> RtapiResult<()> {
        let bytes = s.as_ref();
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let remaining = self.remaining();
        if len + 1 > remaining {
            return Err(RtapiError::OutOfSpace {
                needed: len + 1,
                remaining,
            });
        }
        let end = self.offset + len;
        self.buf[self.offset..end].copy_from_slice(&bytes[..len]);
        self.buf[end] = 0;
        self.offset = end + 1;
        Ok(())
    }
}

impl<'a> Cursor<&'a [u8]> {
    fn take(&mut self, n: usize) -> RtapiResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(RtapiError::WouldBlock);
        }
        let buf: &'a [u8] = self.buf;
        let bytes = &buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> RtapiResult<[u8; N]> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.take(N)?);
        Ok(raw)
    }

    /// Read one byte.
    pub fn get_u8(&mut self) -> RtapiResult<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Read a native `int`.
    pub fn get_int(&mut self) -> RtapiResult<c_int> {
        Ok(c_int::from_ne_bytes(self.take_array()?))
    }

    /// Read a native `long`.
    pub fn get_long(&mut self) -> RtapiResult<c_long> {
        Ok(c_long::from_ne_bytes(self.take_array()?))
    }

    /// Read a 32-bit float.
    pub fn get_f32(&mut self) -> RtapiResult<f32> {
        Ok(f32::from_ne_bytes(self.take_array()?))
    }

    /// Read a 64-bit float.
    pub fn get_f64(&mut self) -> RtapiResult<f64> {
        Ok(f64::from_ne_bytes(self.take_array()?))
    }

    /// Read a C string, returning the bytes before its NUL.
    ///
    /// `WouldBlock` if no NUL occurs before the end of the region.
    pub fn get_str(&mut self) -> RtapiResult<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        let rest = &buf[self.offset..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(RtapiError::WouldBlock)?;
        self.offset += len + 1;
        Ok(&rest[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn new_buffer_is_zeroed() {
        let buf = Buffer::new(32);
        assert_eq!(buf.capacity(), 32);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn typed_values_roundtrip_in_order() {
        let mut buf = Buffer::new(64);
        let mut w = buf.cursor_mut();
        w.put_u8(0xA5).unwrap();
        w.put_int(-42).unwrap();
        w.put_long(c_long::MIN).unwrap();
        w.put_f32(1.5).unwrap();
        w.put_f64(-2.25e300).unwrap();
        w.put_str("spindle").unwrap();
        let written = w.position();

        let mut r = buf.cursor();
        assert_eq!(r.get_u8().unwrap(), 0xA5);
        assert_eq!(r.get_int().unwrap(), -42);
        assert_eq!(r.get_long().unwrap(), c_long::MIN);
        assert_eq!(r.get_f32().unwrap(), 1.5);
        assert_eq!(r.get_f64().unwrap(), -2.25e300);
        assert_eq!(r.get_str().unwrap(), b"spindle");
        assert_eq!(r.position(), written);
    }

    #[test]
    fn full_write_leaves_offset_unchanged() {
        let mut buf = Buffer::new(size_of::<c_int>() + 2);
        let mut w = buf.cursor_mut();
        w.put_int(7).unwrap();
        let before = w.position();

        let err = w.put_int(8).unwrap_err();
        assert!(matches!(
            err,
            RtapiError::OutOfSpace {
                needed,
                remaining: 2
            } if needed == size_of::<c_int>()
        ));
        assert_eq!(w.position(), before);

        // Two bytes left: "ab" needs three with its NUL.
        assert!(w.put_str("ab").is_err());
        assert_eq!(w.position(), before);
        w.put_str("a").unwrap();
        assert_eq!(w.remaining(), 0);
    }

    #[test]
    fn unterminated_string_would_block() {
        let data = *b"abc";
        let mut r = Cursor::new(&data[..]);
        assert!(matches!(r.get_str(), Err(RtapiError::WouldBlock)));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn short_read_would_block_without_moving() {
        let data = [1u8, 2, 3];
        let mut r = Cursor::new(&data[..]);
        assert!(matches!(r.get_long(), Err(RtapiError::WouldBlock)));
        assert_eq!(r.position(), 0);
        assert_eq!(r.get_u8().unwrap(), 1);
    }

    #[test]
    fn interior_nul_truncates_string() {
        let mut buf = Buffer::new(16);
        let mut w = buf.cursor_mut();
        w.put_str("ab\0cd").unwrap();
        assert_eq!(w.position(), 3);
        assert_eq!(buf.cursor().get_str().unwrap(), b"ab");
    }

    #[test]
    fn set_position_is_bounds_checked() {
        let mut buf = Buffer::new(8);
        let mut w = buf.cursor_mut();
        assert!(w.set_position(8).is_ok());
        assert_eq!(w.remaining(), 0);
        assert!(matches!(
            w.set_position(9),
            Err(RtapiError::InvalidArgument(_))
        ));
        assert_eq!(w.position(), 8);
        w.rewind();
        assert_eq!(w.position(), 0);
    }

    #[test]
    fn truncation_by_repositioning() {
        let mut buf = Buffer::new(32);
        let mut w = buf.cursor_mut();
        w.put_str("first").unwrap();
        let mark = w.position();
        w.put_str("discard").unwrap();
        w.set_position(mark).unwrap();
        w.put_str("kept").unwrap();

        let mut r = buf.cursor();
        assert_eq!(r.get_str().unwrap(), b"first");
        assert_eq!(r.get_str().unwrap(), b"kept");
    }
}
