/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Typed buffers passed to and returned from native commands.
//!
//! The binding layer never needs a particular array library. Anything that can
//! report its element type, its length and a raw pointer to its storage can be
//! passed where a command expects an array, see [ArrayBuffer]. [TypedBuffer] is
//! the buffer type the crate allocates itself, e.g. for large output arrays.

use crate::binding::Value;
use std::ffi::c_void;

/// The fixed set of machine-level types that values are marshalled as.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    Pointer,
    Void,
}

impl Primitive {
    /// Size in bytes of one value. `Void` counts as a byte, so that untyped
    /// buffers are measured in bytes.
    pub fn size(self) -> usize {
        match self {
            Primitive::Int8 | Primitive::UInt8 | Primitive::Void => 1,
            Primitive::Int16 | Primitive::UInt16 => 2,
            Primitive::Int32 | Primitive::UInt32 | Primitive::Float => 4,
            Primitive::Int64 | Primitive::UInt64 | Primitive::Double => 8,
            Primitive::Pointer => std::mem::size_of::<usize>(),
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            Primitive::Float | Primitive::Double | Primitive::Pointer | Primitive::Void
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float | Primitive::Double)
    }

    /// The C spelling, for prototypes and diagnostics.
    pub fn c_name(self) -> &'static str {
        match self {
            Primitive::Int8 => "int8_t",
            Primitive::UInt8 => "uint8_t",
            Primitive::Int16 => "int16_t",
            Primitive::UInt16 => "uint16_t",
            Primitive::Int32 => "int32_t",
            Primitive::UInt32 => "uint32_t",
            Primitive::Int64 => "int64_t",
            Primitive::UInt64 => "uint64_t",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Pointer => "void *",
            Primitive::Void => "void",
        }
    }
}

/// A contiguous run of primitive values in memory that a native command may
/// read from or write to.
pub trait ArrayBuffer {
    fn element_type(&self) -> Primitive;

    /// Number of elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn byte_len(&self) -> usize {
        self.len() * self.element_type().size()
    }

    fn as_ptr(&self) -> *const c_void;

    fn as_mut_ptr(&mut self) -> *mut c_void;
}

/// Rust types that correspond to a [Primitive], so that plain vectors can be
/// used as [ArrayBuffer]s.
pub trait Element: Copy {
    const PRIMITIVE: Primitive;
}

macro_rules! impl_Element {
    ($($t:ty => $p:ident),*) => {
        $(impl Element for $t {
            const PRIMITIVE: Primitive = Primitive::$p;
        })*
    }
}
impl_Element!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    usize => Pointer
);

impl<T: Element> ArrayBuffer for Vec<T> {
    fn element_type(&self) -> Primitive {
        T::PRIMITIVE
    }
    fn len(&self) -> usize {
        Vec::len(self)
    }
    fn as_ptr(&self) -> *const c_void {
        self.as_slice().as_ptr().cast()
    }
    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.as_mut_slice().as_mut_ptr().cast()
    }
}

/// An owned buffer of one of the primitive element types.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Pointer(Vec<usize>),
}

/// Runs an expression on the vector inside any [TypedBuffer] variant.
macro_rules! with_vec {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            TypedBuffer::Int8($v) => $body,
            TypedBuffer::UInt8($v) => $body,
            TypedBuffer::Int16($v) => $body,
            TypedBuffer::UInt16($v) => $body,
            TypedBuffer::Int32($v) => $body,
            TypedBuffer::UInt32($v) => $body,
            TypedBuffer::Int64($v) => $body,
            TypedBuffer::UInt64($v) => $body,
            TypedBuffer::Float($v) => $body,
            TypedBuffer::Double($v) => $body,
            TypedBuffer::Pointer($v) => $body,
        }
    };
}

impl TypedBuffer {
    /// Allocate `len` zeroed elements. There is no buffer of `Void`.
    pub fn zeroed(element_type: Primitive, len: usize) -> Option<TypedBuffer> {
        Some(match element_type {
            Primitive::Int8 => TypedBuffer::Int8(vec![0; len]),
            Primitive::UInt8 => TypedBuffer::UInt8(vec![0; len]),
            Primitive::Int16 => TypedBuffer::Int16(vec![0; len]),
            Primitive::UInt16 => TypedBuffer::UInt16(vec![0; len]),
            Primitive::Int32 => TypedBuffer::Int32(vec![0; len]),
            Primitive::UInt32 => TypedBuffer::UInt32(vec![0; len]),
            Primitive::Int64 => TypedBuffer::Int64(vec![0; len]),
            Primitive::UInt64 => TypedBuffer::UInt64(vec![0; len]),
            Primitive::Float => TypedBuffer::Float(vec![0.0; len]),
            Primitive::Double => TypedBuffer::Double(vec![0.0; len]),
            Primitive::Pointer => TypedBuffer::Pointer(vec![0; len]),
            Primitive::Void => return None,
        })
    }

    /// Convert a list of scalar values into a buffer of the given type.
    /// Returns the index of the first value that can't be represented.
    pub fn from_values(element_type: Primitive, values: &[Value]) -> Result<TypedBuffer, usize> {
        let mut buffer = TypedBuffer::zeroed(element_type, values.len()).ok_or(0usize)?;
        for (i, value) in values.iter().enumerate() {
            if !buffer.set(i, value) {
                return Err(i);
            }
        }
        Ok(buffer)
    }

    /// Store a scalar value at `index`. Returns `false` if the value has the
    /// wrong kind or is out of range for the element type.
    pub fn set(&mut self, index: usize, value: &Value) -> bool {
        macro_rules! store_int {
            ($v:ident, $t:ty) => {{
                let converted = match *value {
                    Value::Int(i) => <$t>::try_from(i).ok(),
                    Value::UInt(u) => <$t>::try_from(u).ok(),
                    _ => None,
                };
                match (converted, $v.get_mut(index)) {
                    (Some(converted), Some(slot)) => {
                        *slot = converted;
                        true
                    }
                    _ => false,
                }
            }};
        }
        macro_rules! store_float {
            ($v:ident, $t:ty) => {{
                let converted = match *value {
                    Value::Float(f) => Some(f as $t),
                    Value::Int(i) => Some(i as $t),
                    Value::UInt(u) => Some(u as $t),
                    _ => None,
                };
                match (converted, $v.get_mut(index)) {
                    (Some(converted), Some(slot)) => {
                        *slot = converted;
                        true
                    }
                    _ => false,
                }
            }};
        }
        match self {
            TypedBuffer::Int8(v) => store_int!(v, i8),
            TypedBuffer::UInt8(v) => store_int!(v, u8),
            TypedBuffer::Int16(v) => store_int!(v, i16),
            TypedBuffer::UInt16(v) => store_int!(v, u16),
            TypedBuffer::Int32(v) => store_int!(v, i32),
            TypedBuffer::UInt32(v) => store_int!(v, u32),
            TypedBuffer::Int64(v) => store_int!(v, i64),
            TypedBuffer::UInt64(v) => store_int!(v, u64),
            TypedBuffer::Float(v) => store_float!(v, f32),
            TypedBuffer::Double(v) => store_float!(v, f64),
            TypedBuffer::Pointer(v) => {
                let converted = match *value {
                    Value::Pointer(p) => Some(p),
                    Value::UInt(u) => usize::try_from(u).ok(),
                    Value::Int(i) => usize::try_from(i).ok(),
                    _ => None,
                };
                match (converted, v.get_mut(index)) {
                    (Some(converted), Some(slot)) => {
                        *slot = converted;
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match self {
            TypedBuffer::Int8(v) => Value::Int((*v.get(index)?).into()),
            TypedBuffer::UInt8(v) => Value::UInt((*v.get(index)?).into()),
            TypedBuffer::Int16(v) => Value::Int((*v.get(index)?).into()),
            TypedBuffer::UInt16(v) => Value::UInt((*v.get(index)?).into()),
            TypedBuffer::Int32(v) => Value::Int((*v.get(index)?).into()),
            TypedBuffer::UInt32(v) => Value::UInt((*v.get(index)?).into()),
            TypedBuffer::Int64(v) => Value::Int(*v.get(index)?),
            TypedBuffer::UInt64(v) => Value::UInt(*v.get(index)?),
            TypedBuffer::Float(v) => Value::Float((*v.get(index)?).into()),
            TypedBuffer::Double(v) => Value::Float(*v.get(index)?),
            TypedBuffer::Pointer(v) => Value::Pointer(*v.get(index)?),
        })
    }

    pub fn to_values(&self) -> Vec<Value> {
        (0..ArrayBuffer::len(self))
            .filter_map(|i| self.get(i))
            .collect()
    }

    /// Resize the buffer, filling new elements with zero.
    pub fn resize(&mut self, len: usize) {
        with_vec!(self, v => v.resize(len, Default::default()))
    }
}

impl Default for TypedBuffer {
    fn default() -> TypedBuffer {
        TypedBuffer::UInt8(Vec::new())
    }
}

impl ArrayBuffer for TypedBuffer {
    fn element_type(&self) -> Primitive {
        match self {
            TypedBuffer::Int8(_) => Primitive::Int8,
            TypedBuffer::UInt8(_) => Primitive::UInt8,
            TypedBuffer::Int16(_) => Primitive::Int16,
            TypedBuffer::UInt16(_) => Primitive::UInt16,
            TypedBuffer::Int32(_) => Primitive::Int32,
            TypedBuffer::UInt32(_) => Primitive::UInt32,
            TypedBuffer::Int64(_) => Primitive::Int64,
            TypedBuffer::UInt64(_) => Primitive::UInt64,
            TypedBuffer::Float(_) => Primitive::Float,
            TypedBuffer::Double(_) => Primitive::Double,
            TypedBuffer::Pointer(_) => Primitive::Pointer,
        }
    }
    fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }
    fn as_ptr(&self) -> *const c_void {
        with_vec!(self, v => v.as_ptr().cast())
    }
    fn as_mut_ptr(&mut self) -> *mut c_void {
        with_vec!(self, v => v.as_mut_ptr().cast())
    }
}
