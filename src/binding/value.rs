/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Dynamically-typed arguments and results of bound commands.

use crate::abi::RawValue;
use crate::buffer::{ArrayBuffer, Element, TypedBuffer};
use std::fmt;

/// An argument to a bound command. Which kinds are accepted depends on the
/// role of the parameter, see [super::Marshaller].
pub enum Arg<'a> {
    /// A null pointer.
    Null,
    Int(i64),
    Float(f64),
    Text(&'a str),
    /// A list of strings, for `const GLchar *const*` parameters.
    Texts(&'a [&'a str]),
    /// A list of scalars, converted to a buffer of the parameter's type.
    Values(&'a [Value]),
    Buffer(&'a dyn ArrayBuffer),
    /// A buffer the command may write into.
    BufferMut(&'a mut dyn ArrayBuffer),
}

impl Arg<'_> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Arg::Null => "null",
            Arg::Int(_) => "an integer",
            Arg::Float(_) => "a float",
            Arg::Text(_) => "text",
            Arg::Texts(_) => "a list of strings",
            Arg::Values(_) => "a list of values",
            Arg::Buffer(_) => "a buffer",
            Arg::BufferMut(_) => "a writable buffer",
        }
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => write!(f, "Null"),
            Arg::Int(i) => write!(f, "Int({})", i),
            Arg::Float(x) => write!(f, "Float({})", x),
            Arg::Text(s) => write!(f, "Text({:?})", s),
            Arg::Texts(s) => write!(f, "Texts({:?})", s),
            Arg::Values(v) => write!(f, "Values({:?})", v),
            Arg::Buffer(b) => write!(f, "Buffer({:?} x {})", b.element_type(), b.len()),
            Arg::BufferMut(b) => write!(f, "BufferMut({:?} x {})", b.element_type(), b.len()),
        }
    }
}

macro_rules! impl_From_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg<'_> {
            fn from(value: $t) -> Self {
                Arg::Int(value as i64)
            }
        })*
    }
}
// u64 keeps its bits, e.g. for GL_TIMEOUT_IGNORED
impl_From_int!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize);

impl From<bool> for Arg<'_> {
    fn from(value: bool) -> Self {
        Arg::Int(value.into())
    }
}
impl From<f32> for Arg<'_> {
    fn from(value: f32) -> Self {
        Arg::Float(value.into())
    }
}
impl From<f64> for Arg<'_> {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}
impl<'a> From<&'a str> for Arg<'a> {
    fn from(value: &'a str) -> Self {
        Arg::Text(value)
    }
}
impl<'a> From<&'a [&'a str]> for Arg<'a> {
    fn from(value: &'a [&'a str]) -> Self {
        Arg::Texts(value)
    }
}
impl<'a> From<&'a [Value]> for Arg<'a> {
    fn from(value: &'a [Value]) -> Self {
        Arg::Values(value)
    }
}
impl<'a, T: Element> From<&'a Vec<T>> for Arg<'a> {
    fn from(value: &'a Vec<T>) -> Self {
        Arg::Buffer(value)
    }
}
impl<'a, T: Element> From<&'a mut Vec<T>> for Arg<'a> {
    fn from(value: &'a mut Vec<T>) -> Self {
        Arg::BufferMut(value)
    }
}
impl<'a> From<&'a TypedBuffer> for Arg<'a> {
    fn from(value: &'a TypedBuffer) -> Self {
        Arg::Buffer(value)
    }
}
impl<'a> From<&'a mut TypedBuffer> for Arg<'a> {
    fn from(value: &'a mut TypedBuffer) -> Self {
        Arg::BufferMut(value)
    }
}

/// A result of a bound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    /// An address.
    Pointer(usize),
    /// A C string, or `None` for a null pointer.
    Text(Option<String>),
    List(Vec<Value>),
    Buffer(TypedBuffer),
}

impl Value {
    /// Convert a scalar native value. There is no value for `void`.
    pub fn from_raw(raw: RawValue) -> Option<Value> {
        Some(match raw {
            RawValue::Int8(v) => Value::Int(v.into()),
            RawValue::Int16(v) => Value::Int(v.into()),
            RawValue::Int32(v) => Value::Int(v.into()),
            RawValue::Int64(v) => Value::Int(v),
            RawValue::UInt8(v) => Value::UInt(v.into()),
            RawValue::UInt16(v) => Value::UInt(v.into()),
            RawValue::UInt32(v) => Value::UInt(v.into()),
            RawValue::UInt64(v) => Value::UInt(v),
            RawValue::Float(v) => Value::Float(v.into()),
            RawValue::Double(v) => Value::Float(v),
            RawValue::Pointer(p) => Value::Pointer(p as usize),
            RawValue::Void => return None,
        })
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            Value::UInt(u) => i64::try_from(u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(i) => u64::try_from(i).ok(),
            Value::UInt(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => text.as_deref(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }
}
