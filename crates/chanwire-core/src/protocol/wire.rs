//! Wire types and primitive codecs (panic-free).
//!
//! Encoding rules:
//! - Fixed-width integers and floats are big-endian.
//! - `varint`: 7 bits per byte, low group first, high bit = continuation, max 5 bytes.
//! - `string` / `bytes`: varint length prefix then the raw bytes.
//!
//! Reads never index the buffer; every read is guarded by `remaining()`.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ChanwireError, Result};

/// Longest string accepted on the wire, in bytes.
pub const MAX_STRING_BYTES: usize = 32767;

/// Longest varint, in bytes (32-bit payload).
pub const MAX_VARINT_BYTES: usize = 5;

/// On-wire representation of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    VarInt,
    Str,
    Bytes,
}

impl WireType {
    /// Tag name as written in an explicit override.
    pub fn as_str(self) -> &'static str {
        match self {
            WireType::Bool => "bool",
            WireType::U8 => "u8",
            WireType::I8 => "i8",
            WireType::U16 => "u16",
            WireType::I16 => "i16",
            WireType::U32 => "u32",
            WireType::I32 => "i32",
            WireType::U64 => "u64",
            WireType::I64 => "i64",
            WireType::F32 => "f32",
            WireType::F64 => "f64",
            WireType::VarInt => "varint",
            WireType::Str => "string",
            WireType::Bytes => "bytes",
        }
    }

    /// Fixed on-wire width, `None` for length-prefixed or variable types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            WireType::Bool | WireType::U8 | WireType::I8 => Some(1),
            WireType::U16 | WireType::I16 => Some(2),
            WireType::U32 | WireType::I32 | WireType::F32 => Some(4),
            WireType::U64 | WireType::I64 | WireType::F64 => Some(8),
            WireType::VarInt | WireType::Str | WireType::Bytes => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            WireType::U8
                | WireType::I8
                | WireType::U16
                | WireType::I16
                | WireType::U32
                | WireType::I32
                | WireType::U64
                | WireType::I64
                | WireType::VarInt
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, WireType::F32 | WireType::F64)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let ty = match s {
            "bool" => WireType::Bool,
            "u8" => WireType::U8,
            "i8" => WireType::I8,
            "u16" => WireType::U16,
            "i16" => WireType::I16,
            "u32" => WireType::U32,
            "i32" => WireType::I32,
            "u64" => WireType::U64,
            "i64" => WireType::I64,
            "f32" => WireType::F32,
            "f64" => WireType::F64,
            "varint" => WireType::VarInt,
            "string" => WireType::Str,
            "bytes" => WireType::Bytes,
            other => return Err(format!("unknown wire type `{other}`")),
        };
        Ok(ty)
    }
}

/// Storage-independent field value moved between accessors and codecs.
///
/// Every integer travels as `i64`; unsigned 64-bit values keep their bit
/// pattern through `as` casts, so narrowing and widening are plain
/// two's-complement truncation and extension.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Bytes),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
        }
    }
}

/// Write `value` at wire type `ty`.
///
/// Integers are truncated to the declared width. A value whose kind does not
/// fit `ty` is an internal error; registration rules out such pairings.
pub fn write_value(ty: WireType, value: &Value, out: &mut BytesMut) -> Result<()> {
    match (ty, value) {
        (WireType::Bool, Value::Bool(b)) => out.put_u8(u8::from(*b)),
        (WireType::U8, Value::Int(v)) => out.put_u8(*v as u8),
        (WireType::I8, Value::Int(v)) => out.put_i8(*v as i8),
        (WireType::U16, Value::Int(v)) => out.put_u16(*v as u16),
        (WireType::I16, Value::Int(v)) => out.put_i16(*v as i16),
        (WireType::U32, Value::Int(v)) => out.put_u32(*v as u32),
        (WireType::I32, Value::Int(v)) => out.put_i32(*v as i32),
        (WireType::U64, Value::Int(v)) => out.put_u64(*v as u64),
        (WireType::I64, Value::Int(v)) => out.put_i64(*v),
        (WireType::VarInt, Value::Int(v)) => write_varint(*v as u32, out),
        (WireType::F32, Value::Float(v)) => out.put_f32(*v as f32),
        (WireType::F64, Value::Float(v)) => out.put_f64(*v),
        (WireType::Str, Value::Str(s)) => write_string(s, out)?,
        (WireType::Bytes, Value::Bytes(b)) => {
            let len = u32::try_from(b.len())
                .map_err(|_| ChanwireError::BadMessage("byte field too long".into()))?;
            write_varint(len, out);
            out.put_slice(b);
        }
        (ty, v) => {
            return Err(ChanwireError::Internal(format!(
                "cannot write {} value as {ty}",
                v.kind()
            )))
        }
    }
    Ok(())
}

/// Read one value of wire type `ty`, sign- or zero-extending integers.
pub fn read_value(ty: WireType, buf: &mut Bytes) -> Result<Value> {
    if let Some(width) = ty.fixed_width() {
        if buf.remaining() < width {
            return Err(ChanwireError::truncated(ty.as_str(), width, buf.remaining()));
        }
    }
    let value = match ty {
        WireType::Bool => Value::Bool(buf.get_u8() != 0),
        WireType::U8 => Value::Int(i64::from(buf.get_u8())),
        WireType::I8 => Value::Int(i64::from(buf.get_i8())),
        WireType::U16 => Value::Int(i64::from(buf.get_u16())),
        WireType::I16 => Value::Int(i64::from(buf.get_i16())),
        WireType::U32 => Value::Int(i64::from(buf.get_u32())),
        WireType::I32 => Value::Int(i64::from(buf.get_i32())),
        WireType::U64 => Value::Int(buf.get_u64() as i64),
        WireType::I64 => Value::Int(buf.get_i64()),
        WireType::F32 => Value::Float(f64::from(buf.get_f32())),
        WireType::F64 => Value::Float(buf.get_f64()),
        WireType::VarInt => Value::Int(i64::from(read_varint(buf)?)),
        WireType::Str => Value::Str(read_string(buf)?),
        WireType::Bytes => {
            let len = read_varint(buf)? as usize;
            if buf.remaining() < len {
                return Err(ChanwireError::truncated("bytes", len, buf.remaining()));
            }
            Value::Bytes(buf.copy_to_bytes(len))
        }
    };
    Ok(value)
}

pub fn write_varint(mut v: u32, out: &mut BytesMut) {
    loop {
        if v & !0x7F == 0 {
            out.put_u8(v as u8);
            return;
        }
        out.put_u8(((v & 0x7F) | 0x80) as u8);
        v >>= 7;
    }
}

pub fn read_varint(buf: &mut Bytes) -> Result<u32> {
    let mut out: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        if !buf.has_remaining() {
            return Err(ChanwireError::truncated("varint", i + 1, i));
        }
        let b = buf.get_u8();
        out |= u32::from(b & 0x7F) << (7 * i);
        if b & 0x80 == 0 {
            return Ok(out);
        }
    }
    Err(ChanwireError::Malformed("varint longer than 5 bytes".into()))
}

pub fn write_string(s: &str, out: &mut BytesMut) -> Result<()> {
    if s.len() > MAX_STRING_BYTES {
        return Err(ChanwireError::BadMessage(format!(
            "string of {} bytes exceeds {MAX_STRING_BYTES}",
            s.len()
        )));
    }
    write_varint(s.len() as u32, out);
    out.put_slice(s.as_bytes());
    Ok(())
}

pub fn read_string(buf: &mut Bytes) -> Result<String> {
    let len = read_varint(buf)? as usize;
    if len > MAX_STRING_BYTES {
        return Err(ChanwireError::Malformed(format!(
            "string length {len} exceeds {MAX_STRING_BYTES}"
        )));
    }
    if buf.remaining() < len {
        return Err(ChanwireError::truncated("string", len, buf.remaining()));
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| ChanwireError::Malformed(format!("string not utf-8: {e}")))
}
