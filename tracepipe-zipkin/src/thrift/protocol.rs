//! Reader and writer for the Thrift binary protocol.

use crate::ThriftError;

pub const STOP: u8 = 0;
pub const BOOL: u8 = 2;
pub const BYTE: u8 = 3;
pub const DOUBLE: u8 = 4;
pub const I16: u8 = 6;
pub const I32: u8 = 8;
pub const I64: u8 = 10;
pub const STRING: u8 = 11;
pub const STRUCT: u8 = 12;
pub const MAP: u8 = 13;
pub const SET: u8 = 14;
pub const LIST: u8 = 15;

/// Maximum nesting of structs and containers.
const MAX_DEPTH: usize = 64;

fn check_type(field_type: u8) -> Result<u8, ThriftError> {
    match field_type {
        BOOL | BYTE | DOUBLE | I16 | I32 | I64 | STRING | STRUCT | MAP | SET | LIST => {
            Ok(field_type)
        }
        other => Err(ThriftError::InvalidFieldType(other)),
    }
}

/// Reads values from a byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    input: &'a [u8],
    depth: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, depth: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ThriftError> {
        if self.input.len() < len {
            return Err(ThriftError::UnexpectedEof);
        }
        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ThriftError> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub fn read_byte(&mut self) -> Result<u8, ThriftError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ThriftError> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16, ThriftError> {
        self.read_array().map(i16::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, ThriftError> {
        self.read_array().map(i32::from_be_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, ThriftError> {
        self.read_array().map(i64::from_be_bytes)
    }

    fn read_size(&mut self) -> Result<usize, ThriftError> {
        let size = self.read_i32()?;
        usize::try_from(size).map_err(|_| ThriftError::NegativeSize(size))
    }

    pub fn read_binary(&mut self) -> Result<Vec<u8>, ThriftError> {
        let len = self.read_size()?;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, ThriftError> {
        Ok(String::from_utf8(self.read_binary()?)?)
    }

    /// Reads a field header, returning `None` at the end of a struct.
    pub fn read_field_begin(&mut self) -> Result<Option<(u8, i16)>, ThriftError> {
        match self.read_byte()? {
            STOP => Ok(None),
            field_type => {
                let field_type = check_type(field_type)?;
                Ok(Some((field_type, self.read_i16()?)))
            }
        }
    }

    /// Reads a list or set header and returns the element type and the declared size.
    pub fn read_list_begin(&mut self) -> Result<(u8, usize), ThriftError> {
        let elem_type = check_type(self.read_byte()?)?;
        Ok((elem_type, self.read_size()?))
    }

    /// Runs `f` one nesting level deeper.
    pub fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ThriftError>,
    ) -> Result<T, ThriftError> {
        if self.depth >= MAX_DEPTH {
            return Err(ThriftError::DepthLimit);
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Reads a list whose elements are of `elem_type`, decoding each with `read_elem`.
    pub fn read_list<T>(
        &mut self,
        elem_type: u8,
        mut read_elem: impl FnMut(&mut Self) -> Result<T, ThriftError>,
    ) -> Result<Vec<T>, ThriftError> {
        let (found, size) = self.read_list_begin()?;
        if found != elem_type {
            return Err(ThriftError::UnexpectedType {
                expected: elem_type,
                found,
            });
        }

        // The size comes from the input, so the vector grows with the elements actually read.
        let mut elems = Vec::new();
        for _ in 0..size {
            elems.push(read_elem(self)?);
        }
        Ok(elems)
    }

    /// Skips over a value of the given type.
    pub fn skip(&mut self, field_type: u8) -> Result<(), ThriftError> {
        match check_type(field_type)? {
            BOOL | BYTE => self.take(1).map(drop),
            I16 => self.take(2).map(drop),
            I32 => self.take(4).map(drop),
            DOUBLE | I64 => self.take(8).map(drop),
            STRING => self.read_binary().map(drop),
            STRUCT => self.nested(|reader| {
                while let Some((field_type, _)) = reader.read_field_begin()? {
                    reader.skip(field_type)?;
                }
                Ok(())
            }),
            MAP => self.nested(|reader| {
                let key_type = check_type(reader.read_byte()?)?;
                let value_type = check_type(reader.read_byte()?)?;
                for _ in 0..reader.read_size()? {
                    reader.skip(key_type)?;
                    reader.skip(value_type)?;
                }
                Ok(())
            }),
            _ => self.nested(|reader| {
                let (elem_type, size) = reader.read_list_begin()?;
                for _ in 0..size {
                    reader.skip(elem_type)?;
                }
                Ok(())
            }),
        }
    }
}

/// Writes values into a growing buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(u8::from(value));
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_size(&mut self, size: usize) {
        self.write_i32(i32::try_from(size).unwrap_or(i32::MAX));
    }

    pub fn write_binary(&mut self, value: &[u8]) {
        self.write_size(value.len());
        self.buf.extend_from_slice(value);
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_binary(value.as_bytes());
    }

    pub fn write_field_begin(&mut self, field_type: u8, id: i16) {
        self.write_byte(field_type);
        self.write_i16(id);
    }

    pub fn write_field_stop(&mut self) {
        self.write_byte(STOP);
    }

    pub fn write_list<T>(
        &mut self,
        elem_type: u8,
        elems: &[T],
        mut write_elem: impl FnMut(&mut Self, &T),
    ) {
        self.write_byte(elem_type);
        self.write_size(elems.len());
        for elem in elems {
            write_elem(self, elem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let mut writer = Writer::new();
        writer.write_bool(true);
        writer.write_i16(-2);
        writer.write_i32(70_000);
        writer.write_i64(-5_000_000_000);
        writer.write_string("frontend");
        let bytes = writer.into_bytes();

        let mut reader = Reader::new(&bytes);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_i32().unwrap(), 70_000);
        assert_eq!(reader.read_i64().unwrap(), -5_000_000_000);
        assert_eq!(reader.read_string().unwrap(), "frontend");
        assert!(matches!(reader.read_byte(), Err(ThriftError::UnexpectedEof)));
    }

    #[test]
    fn test_negative_size() {
        let bytes = (-1i32).to_be_bytes();
        let mut reader = Reader::new(&bytes);
        assert!(matches!(
            reader.read_binary(),
            Err(ThriftError::NegativeSize(-1))
        ));
    }

    #[test]
    fn test_truncated_binary() {
        let mut bytes = 10i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"abc");
        let mut reader = Reader::new(&bytes);
        assert!(matches!(reader.read_binary(), Err(ThriftError::UnexpectedEof)));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = Writer::new();
        writer.write_binary(&[0xff, 0xfe]);
        let bytes = writer.into_bytes();
        assert!(matches!(
            Reader::new(&bytes).read_string(),
            Err(ThriftError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_invalid_field_type() {
        let bytes = [7, 0, 1];
        assert!(matches!(
            Reader::new(&bytes).read_field_begin(),
            Err(ThriftError::InvalidFieldType(7))
        ));
    }

    #[test]
    fn test_skip_nested_containers() {
        let mut writer = Writer::new();
        // map<string, list<i32>> followed by a marker byte
        writer.write_byte(STRING);
        writer.write_byte(LIST);
        writer.write_i32(1);
        writer.write_string("key");
        writer.write_list(I32, &[1, 2, 3], |w, v| w.write_i32(*v));
        writer.write_byte(42);
        let bytes = writer.into_bytes();

        let mut reader = Reader::new(&bytes);
        reader.skip(MAP).unwrap();
        assert_eq!(reader.read_byte().unwrap(), 42);
    }

    #[test]
    fn test_depth_limit() {
        // A struct whose first field is a struct, repeated past the limit.
        let mut bytes = Vec::new();
        for _ in 0..=MAX_DEPTH {
            bytes.extend_from_slice(&[STRUCT, 0, 1]);
        }
        let mut reader = Reader::new(&bytes);
        assert!(matches!(reader.skip(STRUCT), Err(ThriftError::DepthLimit)));
    }

    #[test]
    fn test_list_type_mismatch() {
        let mut writer = Writer::new();
        writer.write_list(I32, &[1], |w, v| w.write_i32(*v));
        let bytes = writer.into_bytes();
        let result = Reader::new(&bytes).read_list(STRUCT, |r| r.read_i32());
        assert!(matches!(
            result,
            Err(ThriftError::UnexpectedType {
                expected: STRUCT,
                found: I32
            })
        ));
    }
}
