use super::Malformed;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Serialize for i16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

/// Big-endian cursor over a class file (or some part of one)
///
/// Offsets reported in errors are relative to the start of the whole class file, even when the
/// cursor is only over an attribute body.
#[derive(Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    position: usize,
    base_offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor {
            bytes,
            position: 0,
            base_offset: 0,
        }
    }

    /// Position within the cursor's bytes
    pub fn position(&self) -> usize {
        self.position
    }

    /// Position within the whole class file
    pub fn absolute_position(&self) -> usize {
        self.base_offset + self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes
    pub fn bytes(&mut self, len: usize) -> std::result::Result<&'a [u8], Malformed> {
        if self.remaining() < len {
            return Err(Malformed::UnexpectedEnd {
                offset: self.absolute_position(),
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Split off a cursor over the next `len` bytes
    pub fn sub_cursor(&mut self, len: usize) -> std::result::Result<ByteCursor<'a>, Malformed> {
        let base_offset = self.absolute_position();
        let bytes = self.bytes(len)?;
        Ok(ByteCursor {
            bytes,
            position: 0,
            base_offset,
        })
    }

    /// Skip forward until the position is a multiple of 4 (relative to the cursor start)
    pub fn align4(&mut self) -> std::result::Result<(), Malformed> {
        let padding = (4 - self.position % 4) % 4;
        self.bytes(padding).map(|_| ())
    }

    pub fn u8(&mut self) -> std::result::Result<u8, Malformed> {
        self.bytes(1).map(|b| b[0])
    }

    pub fn i8(&mut self) -> std::result::Result<i8, Malformed> {
        self.u8().map(|b| b as i8)
    }

    pub fn u16(&mut self) -> std::result::Result<u16, Malformed> {
        self.bytes(2).map(BigEndian::read_u16)
    }

    pub fn i16(&mut self) -> std::result::Result<i16, Malformed> {
        self.bytes(2).map(BigEndian::read_i16)
    }

    pub fn u32(&mut self) -> std::result::Result<u32, Malformed> {
        self.bytes(4).map(BigEndian::read_u32)
    }

    pub fn i32(&mut self) -> std::result::Result<i32, Malformed> {
        self.bytes(4).map(BigEndian::read_i32)
    }

    pub fn i64(&mut self) -> std::result::Result<i64, Malformed> {
        self.bytes(8).map(BigEndian::read_i64)
    }

    pub fn f32(&mut self) -> std::result::Result<f32, Malformed> {
        self.bytes(4).map(BigEndian::read_f32)
    }

    pub fn f64(&mut self) -> std::result::Result<f64, Malformed> {
        self.bytes(8).map(BigEndian::read_f64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn big_endian_cursor() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x01, 0xFF];
        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(cursor.u32(), Ok(0xCAFEBABE));
        let mut sub = cursor.sub_cursor(2).unwrap();
        assert_eq!(sub.u16(), Ok(1));
        assert!(sub.is_empty());
        assert_eq!(sub.u8(), Err(Malformed::UnexpectedEnd { offset: 6 }));
        assert_eq!(cursor.i8(), Ok(-1));
        assert_eq!(cursor.u16(), Err(Malformed::UnexpectedEnd { offset: 7 }));
    }

    #[test]
    fn serialize_sequences() {
        let mut out = vec![];
        vec![1u16, 0xABCD].serialize(&mut out).unwrap();
        (-2i32).serialize(&mut out).unwrap();
        assert_eq!(out, vec![0, 2, 0, 1, 0xAB, 0xCD, 0xFF, 0xFF, 0xFF, 0xFE]);
    }
}
