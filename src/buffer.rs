//! Random-access decoding of typed values from the captured dump bytes.
//!
//! All multi-byte quantities are big-endian. Object references decode to the
//! raw id only; resolving an id to an [`Instance`](crate::Instance) is the
//! caller's business, through the [`Snapshot`](crate::Snapshot).

use std::fmt;

use crate::constants::*;
use crate::error::MalformedDump;
use crate::snapshot::Id;

/// Basic type of a field, array element or static value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Object,
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl Type {
    pub fn from_tag(tag: u8) -> Option<Type> {
        Some(match tag {
            TAG_OBJECT => Type::Object,
            TAG_BOOLEAN => Type::Boolean,
            TAG_CHAR => Type::Char,
            TAG_FLOAT => Type::Float,
            TAG_DOUBLE => Type::Double,
            TAG_BYTE => Type::Byte,
            TAG_SHORT => Type::Short,
            TAG_INT => Type::Int,
            TAG_LONG => Type::Long,
            _ => return None,
        })
    }

    pub const fn tag(self) -> u8 {
        match self {
            Type::Object => TAG_OBJECT,
            Type::Boolean => TAG_BOOLEAN,
            Type::Char => TAG_CHAR,
            Type::Float => TAG_FLOAT,
            Type::Double => TAG_DOUBLE,
            Type::Byte => TAG_BYTE,
            Type::Short => TAG_SHORT,
            Type::Int => TAG_INT,
            Type::Long => TAG_LONG,
        }
    }

    /// Encoded width in bytes. Only references depend on the dump's id size.
    pub const fn size(self, id_size: IdSize) -> usize {
        match self {
            Type::Object => id_size.bytes(),
            Type::Boolean => BYTES_IN_BOOLEAN,
            Type::Byte => BYTES_IN_BYTE,
            Type::Char => BYTES_IN_CHAR,
            Type::Short => BYTES_IN_SHORT,
            Type::Int => BYTES_IN_INT,
            Type::Float => BYTES_IN_FLOAT,
            Type::Long => BYTES_IN_LONG,
            Type::Double => BYTES_IN_DOUBLE,
        }
    }

    pub const fn is_reference(self) -> bool {
        matches!(self, Type::Object)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Object => "Object",
            Type::Boolean => "boolean",
            Type::Char => "char",
            Type::Float => "float",
            Type::Double => "double",
            Type::Byte => "byte",
            Type::Short => "short",
            Type::Int => "int",
            Type::Long => "long",
        };
        f.write_str(name)
    }
}

/// Width of identifiers in one dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSize(u8);

impl IdSize {
    pub const SHORT: IdSize = IdSize(BYTES_IN_SHORT_ID);
    pub const LONG: IdSize = IdSize(BYTES_IN_LONG_ID);

    pub fn new(bytes: u8) -> Result<IdSize, MalformedDump> {
        match bytes {
            BYTES_IN_SHORT_ID | BYTES_IN_LONG_ID => Ok(IdSize(bytes)),
            _ => Err(MalformedDump::InvalidIdSize(bytes)),
        }
    }

    pub const fn bytes(self) -> usize {
        self.0 as usize
    }
}

impl Default for IdSize {
    fn default() -> Self {
        IdSize::LONG
    }
}

/// A decoded value. References stay unresolved ids; id 0 is null.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Object(Id),
    Boolean(bool),
    Char(u16),
    Float(f32),
    Double(f64),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Object(_) => Type::Object,
            Value::Boolean(_) => Type::Boolean,
            Value::Char(_) => Type::Char,
            Value::Float(_) => Type::Float,
            Value::Double(_) => Type::Double,
            Value::Byte(_) => Type::Byte,
            Value::Short(_) => Type::Short,
            Value::Int(_) => Type::Int,
            Value::Long(_) => Type::Long,
        }
    }

    /// The referenced id, if this is a non-null reference.
    pub fn as_reference(&self) -> Option<Id> {
        match *self {
            Value::Object(id) if id != 0 => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(0) => write!(f, "null"),
            Value::Object(id) => write!(f, "@0x{:x}", id),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "'{}'", c.escape_debug()),
                None => write!(f, "\\u{:04x}", v),
            },
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
        }
    }
}

/// The captured dump bytes shared by every entity of a snapshot.
#[derive(Debug, Clone)]
pub struct DumpBuffer {
    data: Box<[u8]>,
    id_size: IdSize,
}

impl DumpBuffer {
    pub fn new(data: Vec<u8>, id_size: IdSize) -> Self {
        DumpBuffer {
            data: data.into_boxed_slice(),
            id_size,
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![], IdSize::default())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn id_size(&self) -> IdSize {
        self.id_size
    }

    /// A cursor positioned at `position`. Positioning is free; only reads
    /// are bounds checked.
    pub fn cursor(&self, position: usize) -> BufferCursor<'_> {
        BufferCursor {
            buffer: self,
            position,
        }
    }
}

/// Read cursor over a [`DumpBuffer`]. Every read advances by the fixed
/// width of what it decoded.
#[derive(Debug, Clone)]
pub struct BufferCursor<'a> {
    buffer: &'a DumpBuffer,
    position: usize,
}

impl<'a> BufferCursor<'a> {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn skip(&mut self, bytes: usize) -> Result<(), MalformedDump> {
        self.take(bytes).map(|_| ())
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], MalformedDump> {
        let buffer: &'a DumpBuffer = self.buffer;
        let data: &'a [u8] = &buffer.data;
        let end = self
            .position
            .checked_add(needed)
            .filter(|end| *end <= data.len())
            .ok_or(MalformedDump::BufferOverrun {
                offset: self.position,
                needed,
                len: data.len(),
            })?;
        let bytes = &data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], MalformedDump> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, MalformedDump> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, MalformedDump> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, MalformedDump> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, MalformedDump> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_id(&mut self) -> Result<Id, MalformedDump> {
        match self.buffer.id_size.bytes() {
            4 => self.read_u32().map(|id| id as Id),
            _ => self.read_u64(),
        }
    }

    pub fn read_type(&mut self) -> Result<Type, MalformedDump> {
        let offset = self.position;
        let tag = self.read_u8()?;
        Type::from_tag(tag).ok_or(MalformedDump::UnknownTypeTag { tag, offset })
    }

    pub fn read_value(&mut self, ty: Type) -> Result<Value, MalformedDump> {
        Ok(match ty {
            Type::Object => Value::Object(self.read_id()?),
            Type::Boolean => Value::Boolean(self.read_u8()? != 0),
            Type::Byte => Value::Byte(self.read_u8()? as i8),
            Type::Char => Value::Char(self.read_u16()?),
            Type::Short => Value::Short(self.read_u16()? as i16),
            Type::Int => Value::Int(self.read_u32()? as i32),
            Type::Float => Value::Float(f32::from_bits(self.read_u32()?)),
            Type::Long => Value::Long(self.read_u64()? as i64),
            Type::Double => Value::Double(f64::from_bits(self.read_u64()?)),
        })
    }
}

/// Appends values in the dump encoding. Used to synthesize snapshots.
#[derive(Debug, Default)]
pub struct BufferWriter {
    data: Vec<u8>,
    id_size: IdSize,
}

impl BufferWriter {
    pub fn new(id_size: IdSize) -> Self {
        BufferWriter {
            data: vec![],
            id_size,
        }
    }

    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.data.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Ids wider than a 4-byte id size are truncated.
    pub fn write_id(&mut self, id: Id) -> &mut Self {
        match self.id_size.bytes() {
            4 => self.write_u32(id as u32),
            _ => self.write_u64(id),
        }
    }

    pub fn write_value(&mut self, value: Value) -> &mut Self {
        match value {
            Value::Object(id) => self.write_id(id),
            Value::Boolean(v) => self.write_u8(v as u8),
            Value::Byte(v) => self.write_u8(v as u8),
            Value::Char(v) => self.write_u16(v),
            Value::Short(v) => self.write_u16(v as u16),
            Value::Int(v) => self.write_u32(v as u32),
            Value::Float(v) => self.write_u32(v.to_bits()),
            Value::Long(v) => self.write_u64(v as u64),
            Value::Double(v) => self.write_u64(v.to_bits()),
        }
    }

    /// Lays down a static field block: entry count, then per entry the
    /// field-name id, the type tag and the value. Returns the block offset.
    pub fn write_static_block(&mut self, entries: &[(Id, Value)]) -> usize {
        let offset = self.position();
        self.write_u16(entries.len() as u16);
        for (name_id, value) in entries {
            self.write_id(*name_id)
                .write_u8(value.ty().tag())
                .write_value(*value);
        }
        offset
    }

    /// Lays down values back to back, as instance field and array bodies
    /// are stored. Returns the offset of the first value.
    pub fn write_values(&mut self, values: &[Value]) -> usize {
        let offset = self.position();
        for value in values {
            self.write_value(*value);
        }
        offset
    }

    pub fn finish(self) -> DumpBuffer {
        DumpBuffer::new(self.data, self.id_size)
    }
}
