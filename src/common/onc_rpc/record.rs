use std::io::{ErrorKind, Read, Result, Write};

use byteorder::{ByteOrder, NetworkEndian};

pub(crate) fn read_record<RD>(reader: &mut RD, maxlen: usize) -> Result<Vec<u8>>
where
    RD: Read,
{
    let mut buf = Vec::new();

    loop {
        // Read record header
        let mut fragment_header = [0u8; 4];
        reader.read_exact(&mut fragment_header)?;
        let fragment_len = NetworkEndian::read_u32(&fragment_header[..]);

        // Assemble record
        let len = (fragment_len & 0x7FFFFFFF) as usize;
        if buf.len() + len > maxlen || buf.try_reserve(len).is_err() {
            return Err(ErrorKind::OutOfMemory.into());
        }
        let n = reader.take(len as u64).read_to_end(&mut buf)?;
        if n < len {
            return Err(ErrorKind::UnexpectedEof.into());
        }

        // Check if last fragment
        if fragment_len & 0x80000000 != 0 {
            break Ok(buf);
        }
    }
}

pub(crate) fn write_record<WR>(writer: &mut WR, record: Vec<u8>) -> Result<()>
where
    WR: Write,
{
    // Write header
    let fragment_len: u32 = 0x80000000 | (record.len() & 0x7FFFFFFF) as u32;
    let mut fragment_header = [0u8; 4];
    NetworkEndian::write_u32(&mut fragment_header, fragment_len);
    writer.write_all(&fragment_header)?;

    // Write record
    writer.write_all(record.as_slice())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    #[test]
    fn reassemble_single_fragment() {
        let mut cursor = Cursor::new(b"\x80\x00\x00\x04\x01\x02\x03\x04");
        let rec = super::read_record(&mut cursor, 10).unwrap();

        assert_eq!(rec[..], [1, 2, 3, 4])
    }

    #[test]
    fn reassemble_multiple_fragment() {
        let mut cursor = Cursor::new(b"\x00\x00\x00\x02\x01\x02\x80\x00\x00\x02\x03\x04");
        let rec = super::read_record(&mut cursor, 10).unwrap();

        assert_eq!(rec[..], [1, 2, 3, 4])
    }

    #[test]
    fn oversized_record_rejected() {
        let mut cursor = Cursor::new(b"\x80\x00\x00\x0c\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c");
        let err = super::read_record(&mut cursor, 10).unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::OutOfMemory)
    }

    #[test]
    fn roundtrip() {
        let mut cursor = Cursor::new(Vec::new());
        super::write_record(&mut cursor, vec![1, 2, 3]).unwrap();

        assert_eq!(cursor.get_ref()[..], b"\x80\x00\x00\x03\x01\x02\x03"[..]);

        cursor.set_position(0);
        let rec = super::read_record(&mut cursor, 10).unwrap();
        assert_eq!(rec[..], [1, 2, 3])
    }
}
