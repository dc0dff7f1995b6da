//! MessagePack-compatible object codec.
//!
//! Only the subset the guest runtime understands is supported: nil, bool,
//! integers, float64, str, bin, array, map with string keys, and a fixext4
//! extension (type 1) carrying a value registry handle.

use crate::{DecodeError, Result, Value};

/// Extension type tag for registry handles.
pub const EXT_HANDLE: i8 = 1;

/// Maximum nesting depth accepted by the decoder.
pub const MAX_DEPTH: usize = 64;

const NIL: u8 = 0xc0;
const FALSE: u8 = 0xc2;
const TRUE: u8 = 0xc3;
const BIN8: u8 = 0xc4;
const BIN16: u8 = 0xc5;
const BIN32: u8 = 0xc6;
const FLOAT32: u8 = 0xca;
const FLOAT64: u8 = 0xcb;
const UINT8: u8 = 0xcc;
const UINT16: u8 = 0xcd;
const UINT32: u8 = 0xce;
const UINT64: u8 = 0xcf;
const INT8: u8 = 0xd0;
const INT16: u8 = 0xd1;
const INT32: u8 = 0xd2;
const INT64: u8 = 0xd3;
const FIXEXT4: u8 = 0xd6;
const STR8: u8 = 0xd9;
const STR16: u8 = 0xda;
const STR32: u8 = 0xdb;
const ARRAY16: u8 = 0xdc;
const ARRAY32: u8 = 0xdd;
const MAP16: u8 = 0xde;
const MAP32: u8 = 0xdf;

/// Encode a value into a fresh buffer.
#[must_use]
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

/// Append the encoding of `value` to `out`.
pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(NIL),
        Value::Bool(false) => out.push(FALSE),
        Value::Bool(true) => out.push(TRUE),
        Value::Int(i) => write_int(out, *i),
        Value::Float(f) => {
            out.push(FLOAT64);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::Str(s) => {
            write_len(out, s.len(), Some(0xa0), STR8, STR16, STR32);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            write_len(out, b.len(), None, BIN8, BIN16, BIN32);
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            write_collection_len(out, items.len(), 0x90, ARRAY16, ARRAY32);
            for item in items {
                encode_into(item, out);
            }
        }
        Value::Map(entries) => {
            write_collection_len(out, entries.len(), 0x80, MAP16, MAP32);
            for (key, item) in entries {
                write_len(out, key.len(), Some(0xa0), STR8, STR16, STR32);
                out.extend_from_slice(key.as_bytes());
                encode_into(item, out);
            }
        }
        Value::Handle(h) => {
            out.push(FIXEXT4);
            out.extend_from_slice(&EXT_HANDLE.to_be_bytes());
            out.extend_from_slice(&h.to_be_bytes());
        }
    }
}

fn write_int(out: &mut Vec<u8>, i: i64) {
    if (0..=0x7f).contains(&i) {
        out.push(i as u8);
    } else if (-32..0).contains(&i) {
        out.push(i as i8 as u8);
    } else if i >= 0 {
        if let Ok(v) = u8::try_from(i) {
            out.push(UINT8);
            out.push(v);
        } else if let Ok(v) = u16::try_from(i) {
            out.push(UINT16);
            out.extend_from_slice(&v.to_be_bytes());
        } else if let Ok(v) = u32::try_from(i) {
            out.push(UINT32);
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.push(UINT64);
            out.extend_from_slice(&i.to_be_bytes());
        }
    } else if let Ok(v) = i8::try_from(i) {
        out.push(INT8);
        out.extend_from_slice(&v.to_be_bytes());
    } else if let Ok(v) = i16::try_from(i) {
        out.push(INT16);
        out.extend_from_slice(&v.to_be_bytes());
    } else if let Ok(v) = i32::try_from(i) {
        out.push(INT32);
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        out.push(INT64);
        out.extend_from_slice(&i.to_be_bytes());
    }
}

/// Write a str/bin header. `fix` is the fixstr base when the kind has one.
fn write_len(out: &mut Vec<u8>, len: usize, fix: Option<u8>, m8: u8, m16: u8, m32: u8) {
    match (fix, len) {
        (Some(base), 0..=31) => out.push(base | len as u8),
        (_, 0..=0xff) => {
            out.push(m8);
            out.push(len as u8);
        }
        (_, 0x100..=0xffff) => {
            out.push(m16);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            out.push(m32);
            out.extend_from_slice(&(len as u32).to_be_bytes());
        }
    }
}

fn write_collection_len(out: &mut Vec<u8>, len: usize, fix: u8, m16: u8, m32: u8) {
    if len <= 15 {
        out.push(fix | len as u8);
    } else if let Ok(len) = u16::try_from(len) {
        out.push(m16);
        out.extend_from_slice(&len.to_be_bytes());
    } else {
        out.push(m32);
        out.extend_from_slice(&(len as u32).to_be_bytes());
    }
}

/// Decode exactly one value spanning the whole buffer.
///
/// # Errors
///
/// Returns a [`DecodeError`] for truncated, malformed or trailing input.
pub fn decode(data: &[u8]) -> Result<Value> {
    let mut reader = Reader::new(data);
    let value = reader.read_value(0)?;
    if reader.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }
    Ok(value)
}

/// Cursor over an encoded buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<usize> {
        Ok(usize::from(u16::from_be_bytes(self.take_array()?)))
    }

    fn read_u32(&mut self) -> Result<usize> {
        Ok(u32::from_be_bytes(self.take_array()?) as usize)
    }

    fn read_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep);
        }
        let marker = self.read_u8()?;
        match marker {
            0x00..=0x7f => Ok(Value::Int(i64::from(marker))),
            0x80..=0x8f => self.read_map(usize::from(marker & 0x0f), depth),
            0x90..=0x9f => self.read_list(usize::from(marker & 0x0f), depth),
            0xa0..=0xbf => self.read_str(usize::from(marker & 0x1f)),
            0xe0..=0xff => Ok(Value::Int(i64::from(marker as i8))),
            NIL => Ok(Value::Null),
            FALSE => Ok(Value::Bool(false)),
            TRUE => Ok(Value::Bool(true)),
            BIN8 => {
                let len = usize::from(self.read_u8()?);
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            BIN16 => {
                let len = self.read_u16()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            BIN32 => {
                let len = self.read_u32()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            FLOAT32 => Ok(Value::Float(f64::from(f32::from_be_bytes(self.take_array()?)))),
            FLOAT64 => Ok(Value::Float(f64::from_be_bytes(self.take_array()?))),
            UINT8 => Ok(Value::Int(i64::from(self.read_u8()?))),
            UINT16 => Ok(Value::Int(i64::from(u16::from_be_bytes(self.take_array()?)))),
            UINT32 => Ok(Value::Int(i64::from(u32::from_be_bytes(self.take_array()?)))),
            UINT64 => {
                let v = u64::from_be_bytes(self.take_array()?);
                i64::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| DecodeError::IntegerOverflow)
            }
            INT8 => Ok(Value::Int(i64::from(i8::from_be_bytes(self.take_array()?)))),
            INT16 => Ok(Value::Int(i64::from(i16::from_be_bytes(self.take_array()?)))),
            INT32 => Ok(Value::Int(i64::from(i32::from_be_bytes(self.take_array()?)))),
            INT64 => Ok(Value::Int(i64::from_be_bytes(self.take_array()?))),
            FIXEXT4 => {
                let ext = i8::from_be_bytes(self.take_array()?);
                if ext != EXT_HANDLE {
                    return Err(DecodeError::UnknownExtension(ext));
                }
                Ok(Value::Handle(u32::from_be_bytes(self.take_array()?)))
            }
            STR8 => {
                let len = usize::from(self.read_u8()?);
                self.read_str(len)
            }
            STR16 => {
                let len = self.read_u16()?;
                self.read_str(len)
            }
            STR32 => {
                let len = self.read_u32()?;
                self.read_str(len)
            }
            ARRAY16 => {
                let len = self.read_u16()?;
                self.read_list(len, depth)
            }
            ARRAY32 => {
                let len = self.read_u32()?;
                self.read_list(len, depth)
            }
            MAP16 => {
                let len = self.read_u16()?;
                self.read_map(len, depth)
            }
            MAP32 => {
                let len = self.read_u32()?;
                self.read_map(len, depth)
            }
            other => Err(DecodeError::InvalidMarker(other)),
        }
    }

    fn read_str(&mut self, len: usize) -> Result<Value> {
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(Value::Str(s.to_string()))
    }

    fn read_list(&mut self, len: usize, depth: usize) -> Result<Value> {
        // Every element needs at least one byte.
        if len > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_value(depth + 1)?);
        }
        Ok(Value::List(items))
    }

    fn read_map(&mut self, len: usize, depth: usize) -> Result<Value> {
        if len.saturating_mul(2) > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            let Value::Str(key) = self.read_value(depth + 1)? else {
                return Err(DecodeError::NonStringKey);
            };
            let value = self.read_value(depth + 1)?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }
}
