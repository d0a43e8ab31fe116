//! Basic types for XDR, see [RFC4506](https://datatracker.ietf.org/doc/html/rfc4506).
//!
//! Only the subset used by the VXI-11 and portmapper programs is provided:
//!
//! | XDR Type         | Rust type |
//! |------------------|-----------|
//! | integer          | i32       |
//! | unsigned integer | u32       |
//! | Boolean          | bool      |
//! | string<>         | String    |
//! | opaque<>         | Opaque    |
//! | void             | ()        |
//!
//! Smaller integers (u16, u8) travel as full XDR unsigned integers.

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result, Write};

macro_rules! read_padding {
    ($reader:expr, $len:expr) => {
        let pad = (4 - ($len & 3)) & 3;
        for _ in 0..pad {
            let _ = $reader.read_u8()?;
        }
    };
}

macro_rules! write_padding {
    ($writer:expr, $len:expr) => {
        let pad = (4 - ($len & 3)) & 3;
        for _ in 0..pad {
            $writer.write_u8(0)?;
        }
    };
}

pub trait XdrDecode {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read;
}

pub trait XdrEncode {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write;
}

impl XdrDecode for () {
    fn read_xdr<RD>(&mut self, _reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        Ok(())
    }
}

impl XdrEncode for () {
    fn write_xdr<WR>(&self, _writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        Ok(())
    }
}

// 4.1.  Integer
impl XdrDecode for i32 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_i32::<NetworkEndian>()?;
        Ok(())
    }
}

impl XdrEncode for i32 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_i32::<NetworkEndian>(*self)
    }
}

// 4.2 Unsigned Integer
impl XdrDecode for u32 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_u32::<NetworkEndian>()?;
        Ok(())
    }
}

impl XdrEncode for u32 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(*self)
    }
}

impl XdrDecode for u16 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_u32::<NetworkEndian>()? as Self;
        Ok(())
    }
}

impl XdrEncode for u16 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(*self as u32)
    }
}

impl XdrDecode for u8 {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_u32::<NetworkEndian>()? as Self;
        Ok(())
    }
}

impl XdrEncode for u8 {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(*self as u32)
    }
}

// 4.4 Booleans
impl XdrDecode for bool {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        *self = reader.read_i32::<NetworkEndian>()? != 0;
        Ok(())
    }
}

impl XdrEncode for bool {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_i32::<NetworkEndian>(if *self { 1 } else { 0 })
    }
}

// 4.10 Variable-Length Opaque Data
/// Length-prefixed opaque byte string, padded to a 4-byte boundary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Opaque(pub Vec<u8>);

impl From<Vec<u8>> for Opaque {
    fn from(data: Vec<u8>) -> Self {
        Opaque(data)
    }
}

impl From<&[u8]> for Opaque {
    fn from(data: &[u8]) -> Self {
        Opaque(data.to_vec())
    }
}

impl XdrDecode for Opaque {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let len = reader.read_u32::<NetworkEndian>()? as u64;
        self.0.clear();
        let n = reader.take(len).read_to_end(&mut self.0)?;
        if (n as u64) < len {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        read_padding!(reader, len);
        Ok(())
    }
}

impl XdrEncode for Opaque {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        writer.write_u32::<NetworkEndian>(self.0.len() as u32)?;
        writer.write_all(&self.0)?;
        write_padding!(writer, self.0.len());
        Ok(())
    }
}

// 4.11  String
impl XdrDecode for String {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        let len = reader.read_u32::<NetworkEndian>()? as u64;
        self.clear();
        let mut s = reader.take(len);
        s.read_to_string(self)?;
        read_padding!(reader, len);
        Ok(())
    }
}

impl XdrEncode for String {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        let bytes = self.as_bytes();
        writer.write_u32::<NetworkEndian>(bytes.len() as u32)?;
        writer.write_all(bytes)?;
        write_padding!(writer, bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod test_xdr_integer {
    use std::io::Cursor;

    use super::{XdrDecode, XdrEncode};

    #[test]
    fn decode() {
        let mut cursor = Cursor::new(b"\xff\xff\xff\xfe");
        let mut i: i32 = 0;
        i.read_xdr(&mut cursor).unwrap();

        assert_eq!(i, -2)
    }

    #[test]
    fn encode() {
        let mut cursor = Cursor::new(Vec::new());
        let i: i32 = -2;
        i.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\xff\xff\xff\xfe"[..])
    }
}

#[cfg(test)]
mod test_xdr_unsigned {
    use std::io::Cursor;

    use super::{XdrDecode, XdrEncode};

    #[test]
    fn decode() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x01");
        let mut i: u32 = 0;
        i.read_xdr(&mut cursor).unwrap();

        assert_eq!(i, 1)
    }

    #[test]
    fn encode() {
        let mut cursor = Cursor::new(Vec::new());
        let i: u16 = 0xBEEF;
        i.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x00\x00\xbe\xef"[..])
    }
}

#[cfg(test)]
mod test_xdr_boolean {
    use std::io::Cursor;

    use super::{XdrDecode, XdrEncode};

    #[test]
    fn decode() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x01");
        let mut b: bool = false;
        b.read_xdr(&mut cursor).unwrap();

        assert!(b)
    }

    #[test]
    fn encode() {
        let mut cursor = Cursor::new(Vec::new());
        let b: bool = true;
        b.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x00\x00\x00\x01"[..])
    }
}


#[cfg(test)]
mod test_xdr_string {
    use std::io::Cursor;

    use super::{XdrDecode, XdrEncode};

    #[test]
    fn decode() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x02ab\x00\x00");
        let mut s = String::new();
        s.read_xdr(&mut cursor).unwrap();

        assert_eq!(s, "ab");

        let mut cursor = Cursor::new(b"\x00\x00\x00\x04abcd");
        let mut s = String::new();
        s.read_xdr(&mut cursor).unwrap();

        assert_eq!(s, "abcd");
    }

    #[test]
    fn encode() {
        let mut cursor = Cursor::new(Vec::new());
        let s = "inst0".to_string();
        s.write_xdr(&mut cursor).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x00\x00\x00\x05inst0\x00\x00\x00"[..])
    }
}
