//! Serialize data into the big-endian wire format.
use bytes::{BufMut, Bytes};

use crate::error::{KafkaCode, Result};

pub trait ToByte {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()>;
}

impl<'a, T: ToByte + 'a + ?Sized> ToByte for &'a T {
    fn encode<W: BufMut>(&self, buffer: &mut W) -> Result<()> {
        (*self).encode(buffer)
    }
}

impl ToByte for i8 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i8(*self);
        Ok(())
    }
}

impl ToByte for i16 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i16(*self);
        Ok(())
    }
}

impl ToByte for i32 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i32(*self);
        Ok(())
    }
}

impl ToByte for i64 {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i64(*self);
        Ok(())
    }
}

impl ToByte for str {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i16(self.len() as i16);
        buffer.put(self.as_bytes());
        Ok(())
    }
}

impl ToByte for String {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.as_str().encode(buffer)
    }
}

impl<V: ToByte> ToByte for [V] {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        encode_as_array(buffer, self, |buffer, x| x.encode(buffer))
    }
}

/// Raw byte payloads (message sets) carry an `i32` length prefix.
impl ToByte for [u8] {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i32(self.len() as i32);
        buffer.put(self);
        Ok(())
    }
}

impl ToByte for Bytes {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        self.as_ref().encode(buffer)
    }
}

/// Encodes a nullable string: `-1` for `None`, otherwise a regular string.
impl ToByte for Option<String> {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        match self {
            Some(s) => s.encode(buffer),
            None => (-1i16).encode(buffer),
        }
    }
}

impl ToByte for KafkaCode {
    fn encode<T: BufMut>(&self, buffer: &mut T) -> Result<()> {
        buffer.put_i16(i16::from(*self));
        Ok(())
    }
}

/// Renders the length of `xs` to `buffer` as the start of a
/// protocol array and then for each element of `xs` invokes `f`
/// assuming that function will render the element to the buffer.
pub fn encode_as_array<T, F, W>(buffer: &mut W, xs: &[T], mut f: F) -> Result<()>
where
    F: FnMut(&mut W, &T) -> Result<()>,
    W: BufMut,
{
    buffer.put_i32(xs.len() as i32);
    for x in xs {
        f(buffer, x)?;
    }
    Ok(())
}

/// Encode a slice of ToByte items as a protocol array.
pub fn encode_array<T: ToByte, W: BufMut>(buffer: &mut W, items: &[T]) -> Result<()> {
    buffer.put_i32(items.len() as i32);
    for item in items {
        item.encode(buffer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_i16() {
        let mut buf = Vec::new();
        0x1234i16.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x12, 0x34]);
    }

    #[test]
    fn test_encode_i64() {
        let mut buf = Vec::new();
        (-2i64).encode(&mut buf).unwrap();
        assert_eq!(buf, (-2i64).to_be_bytes().to_vec());
    }

    #[test]
    fn test_encode_str() {
        let mut buf = Vec::new();
        "abc".encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_encode_bytes() {
        let mut buf = Vec::new();
        Bytes::from_static(&[9, 8]).encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 2, 9, 8]);
    }

    #[test]
    fn test_encode_nullable_string() {
        let mut buf = Vec::new();
        None::<String>.encode(&mut buf).unwrap();
        Some("x".to_string()).encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0xff, 0xff, 0, 1, b'x']);
    }

    #[test]
    fn test_encode_array_i64() {
        let mut buf = Vec::new();
        encode_array(&mut buf, &[1i64, 0]).unwrap();
        assert_eq!(buf.len(), 4 + 16);
        assert_eq!(&buf[..4], &[0, 0, 0, 2]);
    }

    #[test]
    fn test_encode_as_array() {
        let mut buf = Vec::new();
        encode_as_array(&mut buf, &[1i32, 2], |b, x| (x * 10).encode(b)).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 2, 0, 0, 0, 10, 0, 0, 0, 20]);
    }

    #[test]
    fn test_encode_kafka_code() {
        let mut buf = Vec::new();
        KafkaCode::NetworkException.encode(&mut buf).unwrap();
        KafkaCode::Unknown.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 13, 0xff, 0xff]);
    }

    #[test]
    fn test_encode_reference() {
        let value = 7i32;
        let mut buf = Vec::new();
        (&value).encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 7]);
    }
}
