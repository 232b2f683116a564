//! Structural payload marshaling.
//!
//! MSP payloads carry no type tags: a value is the concatenation of its
//! scalars in declaration order, little-endian. [`Value`] describes such a
//! payload explicitly so the same recursive walk can encode arguments and
//! decode telemetry. Decoding fills a caller-supplied template in place,
//! which fixes record layouts and sequence lengths up front.

use bytes::{BufMut, BytesMut};

use crate::codec::Frame;
use crate::error::{FrameError, Result};

/// A marshalable MSP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    /// Ordered named fields.
    Record(Vec<Field>),
    /// Elements of one shape.
    Sequence(Vec<Value>),
}

/// A named record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
}

impl Value {
    /// Build a record from `(name, value)` pairs, keeping their order.
    pub fn record(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Self::Record(
            fields
                .into_iter()
                .map(|(name, value)| Field { name, value })
                .collect(),
        )
    }

    /// `len` copies of `element`.
    pub fn repeat(element: Value, len: usize) -> Self {
        Self::Sequence(vec![element; len])
    }

    /// Short name of this value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::Record(_) => "record",
            Self::Sequence(_) => "sequence",
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Record(fields) => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }

    /// Numeric value of a scalar, widened to `u32`.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::U32(v) => Some(v),
            _ => None,
        }
    }

    /// Number of bytes this value occupies on the wire.
    pub fn wire_size(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::Record(fields) => fields.iter().map(|f| f.value.wire_size()).sum(),
            Self::Sequence(items) => items.iter().map(Value::wire_size).sum(),
        }
    }

    /// Whether `self` and `other` have the same wire layout.
    pub fn same_shape(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::U8(_), Self::U8(_))
            | (Self::U16(_), Self::U16(_))
            | (Self::U32(_), Self::U32(_)) => true,
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| x.name == y.name && x.value.same_shape(&y.value))
            }
            (Self::Sequence(a), Self::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            _ => false,
        }
    }
}

fn check_homogeneous(items: &[Value]) -> Result<()> {
    if let Some((first, rest)) = items.split_first() {
        if let Some(odd) = rest.iter().find(|item| !item.same_shape(first)) {
            return Err(FrameError::UnsupportedType(format!(
                "heterogeneous sequence ({} element followed by {})",
                first.kind(),
                odd.kind()
            )));
        }
    }
    Ok(())
}

/// Append the wire encoding of `value` to `dst`.
pub fn encode(dst: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::U8(v) => dst.put_u8(*v),
        Value::U16(v) => dst.put_u16_le(*v),
        Value::U32(v) => dst.put_u32_le(*v),
        Value::Record(fields) => {
            for field in fields {
                encode(dst, &field.value)?;
            }
        }
        Value::Sequence(items) => {
            check_homogeneous(items)?;
            for item in items {
                encode(dst, item)?;
            }
        }
    }
    Ok(())
}

/// Encode command arguments back to back.
pub fn encode_args(dst: &mut BytesMut, args: &[Value]) -> Result<()> {
    for arg in args {
        encode(dst, arg)?;
    }
    Ok(())
}

/// Decode from `frame` into the template `out`, advancing the frame cursor.
///
/// On error the template may be partially filled.
pub fn decode_into(frame: &mut Frame, out: &mut Value) -> Result<()> {
    match out {
        Value::U8(v) => *v = frame.read_u8()?,
        Value::U16(v) => *v = frame.read_u16()?,
        Value::U32(v) => *v = frame.read_u32()?,
        Value::Record(fields) => {
            for field in fields.iter_mut() {
                decode_into(frame, &mut field.value)?;
            }
        }
        Value::Sequence(items) => {
            check_homogeneous(items)?;
            for item in items.iter_mut() {
                decode_into(frame, item)?;
            }
        }
    }
    Ok(())
}

/// Rust types with a fixed MSP wire layout.
pub trait Marshal: Sized {
    /// Describe `self` as a [`Value`].
    fn to_value(&self) -> Value;

    /// A zeroed value with this type's layout, used as the decode target.
    fn template() -> Value;

    /// Rebuild from a decoded value with this type's layout.
    fn from_value(value: Value) -> Result<Self>;
}

fn shape_mismatch(expected: &str, found: &Value) -> FrameError {
    FrameError::UnsupportedType(format!("expected {expected}, found {}", found.kind()))
}

impl Marshal for u8 {
    fn to_value(&self) -> Value {
        Value::U8(*self)
    }

    fn template() -> Value {
        Value::U8(0)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::U8(v) => Ok(v),
            other => Err(shape_mismatch("u8", &other)),
        }
    }
}

impl Marshal for u16 {
    fn to_value(&self) -> Value {
        Value::U16(*self)
    }

    fn template() -> Value {
        Value::U16(0)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::U16(v) => Ok(v),
            other => Err(shape_mismatch("u16", &other)),
        }
    }
}

impl Marshal for u32 {
    fn to_value(&self) -> Value {
        Value::U32(*self)
    }

    fn template() -> Value {
        Value::U32(0)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::U32(v) => Ok(v),
            other => Err(shape_mismatch("u32", &other)),
        }
    }
}

impl<T: Marshal, const N: usize> Marshal for [T; N] {
    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(Marshal::to_value).collect())
    }

    fn template() -> Value {
        Value::repeat(T::template(), N)
    }

    fn from_value(value: Value) -> Result<Self> {
        let items = match value {
            Value::Sequence(items) if items.len() == N => items,
            Value::Sequence(items) => {
                return Err(FrameError::UnsupportedType(format!(
                    "expected sequence of {N}, found {}",
                    items.len()
                )))
            }
            other => return Err(shape_mismatch("sequence", &other)),
        };
        let decoded = items
            .into_iter()
            .map(T::from_value)
            .collect::<Result<Vec<T>>>()?;
        decoded
            .try_into()
            .map_err(|_| FrameError::UnsupportedType(format!("expected sequence of {N}")))
    }
}

/// Pulls record fields in declaration order while rebuilding a typed record.
pub struct RecordFields {
    record: &'static str,
    fields: std::vec::IntoIter<Field>,
}

impl RecordFields {
    /// Start reading the fields of `value`, which must be a record.
    pub fn new(record: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Record(fields) => Ok(Self {
                record,
                fields: fields.into_iter(),
            }),
            other => Err(shape_mismatch(record, &other)),
        }
    }

    /// Take the next field as `T`.
    pub fn next<T: Marshal>(&mut self) -> Result<T> {
        let field = self.fields.next().ok_or_else(|| {
            FrameError::UnsupportedType(format!("{} has too few fields", self.record))
        })?;
        T::from_value(field.value)
    }
}

/// Append the wire encoding of a typed value to `dst`.
pub fn encode_value<T: Marshal>(dst: &mut BytesMut, value: &T) -> Result<()> {
    encode(dst, &value.to_value())
}

impl Frame {
    /// Decode into a template value at the cursor.
    pub fn read_into(&mut self, out: &mut Value) -> Result<()> {
        decode_into(self, out)
    }

    /// Decode a typed value at the cursor.
    pub fn read<T: Marshal>(&mut self) -> Result<T> {
        let mut value = T::template();
        decode_into(self, &mut value)?;
        T::from_value(value)
    }
}
