/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Converting between high-level arguments and native argument lists.
//!
//! A [Frame] lives for exactly one call. It holds the native arguments, and
//! owns every allocation they point into (strings, converted lists, output
//! arrays), so nothing can be freed while native code might still read it.

use super::classify::{ArrayBinding, Classification, Marshaller, Pointee, ReturnKind};
use super::value::{Arg, Value};
use super::SIZE_PARAMETER_THRESHOLD;
use crate::abi::RawValue;
use crate::buffer::{ArrayBuffer, Primitive, TypedBuffer};
use crate::error::ArgumentError;
use std::ffi::{c_char, c_void, CStr, CString};

/// How an output array is turned into a result.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum OutputShape {
    /// NUL-terminated text.
    Text,
    /// A small list of values.
    List,
    /// The buffer itself.
    Buffer,
}

pub(super) struct Frame {
    pub(super) slots: Vec<RawValue>,
    outputs: Vec<(OutputShape, TypedBuffer)>,
    references: Vec<TypedBuffer>,
    // Only kept alive for the duration of the call.
    inputs: Vec<TypedBuffer>,
    strings: Vec<CString>,
    string_lists: Vec<Vec<*const c_char>>,
}

fn kind_error(name: &str, expected: &'static str, arg: &Arg) -> ArgumentError {
    ArgumentError::Kind {
        parameter: name.to_string(),
        expected,
        given: arg.kind_name(),
    }
}

/// Convert an integer for a parameter of an integer type. Values that fit the
/// width as either a signed or unsigned number are accepted, so that e.g.
/// `0xFFFFFFFF` can be passed as a `GLint`.
pub(super) fn integer_to_raw(primitive: Primitive, value: i64) -> Option<RawValue> {
    let width = primitive.size() * 8;
    if width < 64 {
        let min = -(1i64 << (width - 1));
        let max = (1i64 << width) - 1;
        if value < min || value > max {
            return None;
        }
    }
    Some(RawValue::from_integer_register(primitive, value as u64))
}

/// Convert an element count for a size parameter. Unlike other integers,
/// sizes must be representable exactly.
pub(super) fn size_to_raw(primitive: Primitive, size: usize) -> Option<RawValue> {
    let width = primitive.size() * 8;
    let max = match (width, primitive.is_signed()) {
        (64, true) => i64::MAX as u64,
        (64, false) => u64::MAX,
        (width, true) => (1u64 << (width - 1)) - 1,
        (width, false) => (1u64 << width) - 1,
    };
    let size = u64::try_from(size).ok().filter(|&size| size <= max)?;
    Some(RawValue::from_integer_register(primitive, size))
}

fn scalar_to_raw(name: &str, primitive: Primitive, arg: &Arg) -> Result<RawValue, ArgumentError> {
    let out_of_range = |value: String| ArgumentError::ValueOutOfRange {
        parameter: name.to_string(),
        value,
        primitive,
    };
    match (primitive, arg) {
        (Primitive::Float, Arg::Float(f)) => Ok(RawValue::Float(*f as f32)),
        (Primitive::Float, Arg::Int(i)) => Ok(RawValue::Float(*i as f32)),
        (Primitive::Double, Arg::Float(f)) => Ok(RawValue::Double(*f)),
        (Primitive::Double, Arg::Int(i)) => Ok(RawValue::Double(*i as f64)),
        (Primitive::Float | Primitive::Double, _) => Err(kind_error(name, "a number", arg)),
        (Primitive::Pointer, Arg::Null) => Ok(RawValue::Pointer(std::ptr::null_mut())),
        (Primitive::Pointer, Arg::Int(i)) => Ok(RawValue::Pointer(*i as usize as *mut c_void)),
        (Primitive::Pointer, _) => Err(kind_error(name, "an integer", arg)),
        (_, Arg::Int(i)) => integer_to_raw(primitive, *i).ok_or_else(|| out_of_range(i.to_string())),
        _ => Err(kind_error(name, "an integer", arg)),
    }
}

/// Checks that a caller's buffer can stand in for an array of `pointee`.
fn check_element_type(
    name: &str,
    pointee: Pointee,
    buffer: &dyn ArrayBuffer,
) -> Result<(), ArgumentError> {
    let given = buffer.element_type();
    let expected = match pointee {
        Pointee::Untyped => return Ok(()),
        Pointee::Text if given == Primitive::Int8 => return Ok(()),
        Pointee::Text => Primitive::UInt8,
        Pointee::Typed(primitive) => primitive,
    };
    if given == expected {
        Ok(())
    } else {
        Err(ArgumentError::ElementType {
            parameter: name.to_string(),
            expected,
            given,
        })
    }
}

/// The number of array elements a caller's buffer provides. Untyped buffers
/// are measured in bytes.
fn buffer_size(array: &ArrayBinding, buffer: &dyn ArrayBuffer) -> Result<usize, ArgumentError> {
    check_element_type(&array.array_name, array.pointee, buffer)?;
    let len = match array.pointee {
        Pointee::Untyped => buffer.byte_len(),
        _ => buffer.len(),
    };
    let multiplier = array.multiplier as usize;
    if multiplier == 0 || len % multiplier != 0 {
        return Err(ArgumentError::NotMultiple {
            parameter: array.array_name.clone(),
            len,
            multiplier: array.multiplier,
        });
    }
    Ok(len / multiplier)
}

fn text_to_c_string(name: &str, text: &str) -> Result<CString, ArgumentError> {
    CString::new(text).map_err(|_| ArgumentError::InteriorNul(name.to_string()))
}

fn values_to_buffer(
    name: &str,
    pointee: Pointee,
    values: &[Value],
) -> Result<TypedBuffer, ArgumentError> {
    let Some(element_type) = pointee.element_type() else {
        return Err(ArgumentError::BufferRequired(name.to_string()));
    };
    TypedBuffer::from_values(element_type, values).map_err(|i| ArgumentError::ValueOutOfRange {
        parameter: name.to_string(),
        value: values
            .get(i)
            .map_or_else(String::new, |value| format!("{:?}", value)),
        primitive: element_type,
    })
}

impl Frame {
    /// Build the native argument list for a call.
    pub(super) fn prepare(
        classification: &Classification,
        args: &mut [Arg],
    ) -> Result<Frame, ArgumentError> {
        let expected = classification.arity();
        if args.len() != expected {
            return Err(ArgumentError::Count {
                expected,
                given: args.len(),
            });
        }

        let mut frame = Frame {
            slots: classification
                .slot_types
                .iter()
                .map(|&primitive| RawValue::zero(primitive))
                .collect(),
            outputs: Vec::new(),
            references: Vec::new(),
            inputs: Vec::new(),
            strings: Vec::new(),
            string_lists: Vec::new(),
        };

        let given = args.len();
        let mut args = args.iter_mut();
        let mut next_arg = || args.next().ok_or(ArgumentError::Count { expected, given });
        for marshaller in &classification.marshallers {
            match marshaller {
                &Marshaller::Null {
                    location,
                    primitive,
                } => frame.slots[location] = RawValue::zero(primitive),
                Marshaller::ReferenceOutput {
                    location,
                    primitive,
                    capacity,
                    ..
                } => {
                    // Void references are rejected when classifying.
                    let mut buffer =
                        TypedBuffer::zeroed(*primitive, *capacity).unwrap_or_default();
                    frame.slots[*location] = RawValue::Pointer(buffer.as_mut_ptr());
                    frame.references.push(buffer);
                }
                Marshaller::PlainValue {
                    location,
                    name,
                    primitive,
                } => {
                    let arg = next_arg()?;
                    frame.slots[*location] = scalar_to_raw(name, *primitive, arg)?;
                }
                Marshaller::OpaquePointer {
                    location,
                    name,
                    pointee,
                    is_const,
                } => {
                    let arg = next_arg()?;
                    let pointer = frame.opaque_pointer(name, *pointee, *is_const, arg)?;
                    frame.slots[*location] = RawValue::Pointer(pointer);
                }
                Marshaller::InputArray(array) => {
                    let arg = next_arg()?;
                    let (pointer, size) = frame.input_array(array, arg)?;
                    frame.set_array(array, pointer, size)?;
                }
                Marshaller::OutputArray(array) => {
                    let arg = next_arg()?;
                    let (pointer, size) = frame.output_array(array, arg)?;
                    frame.set_array(array, pointer, size)?;
                }
            }
        }
        Ok(frame)
    }

    fn set_array(
        &mut self,
        array: &ArrayBinding,
        pointer: *mut c_void,
        size: usize,
    ) -> Result<(), ArgumentError> {
        self.slots[array.array_location] = RawValue::Pointer(pointer);
        self.slots[array.size_location] =
            size_to_raw(array.size_primitive, size).ok_or_else(|| ArgumentError::SizeOverflow {
                parameter: array.size_name.clone(),
                size,
                primitive: array.size_primitive,
            })?;
        Ok(())
    }

    fn keep_input(&mut self, mut buffer: TypedBuffer) -> *mut c_void {
        let pointer = buffer.as_mut_ptr();
        self.inputs.push(buffer);
        pointer
    }

    fn keep_string_list(&mut self, name: &str, texts: &[&str]) -> Result<*mut c_void, ArgumentError> {
        let mut list = Vec::with_capacity(texts.len());
        for text in texts {
            let string = text_to_c_string(name, text)?;
            list.push(string.as_ptr());
            self.strings.push(string);
        }
        let pointer = list.as_mut_ptr().cast();
        self.string_lists.push(list);
        Ok(pointer)
    }

    fn opaque_pointer(
        &mut self,
        name: &str,
        pointee: Pointee,
        is_const: bool,
        arg: &mut Arg,
    ) -> Result<*mut c_void, ArgumentError> {
        let expected = if is_const {
            "a buffer, text, an address or null"
        } else {
            "a writable buffer, an address or null"
        };
        match arg {
            Arg::Null => Ok(std::ptr::null_mut()),
            // e.g. an offset into a bound buffer object
            Arg::Int(address) => Ok(*address as usize as *mut c_void),
            Arg::BufferMut(buffer) => {
                check_element_type(name, pointee, &**buffer)?;
                Ok(buffer.as_mut_ptr())
            }
            Arg::Buffer(buffer) if is_const => {
                check_element_type(name, pointee, *buffer)?;
                Ok(buffer.as_ptr().cast_mut())
            }
            Arg::Text(text) if is_const && pointee == Pointee::Text => {
                let string = text_to_c_string(name, text)?;
                let pointer = string.as_ptr().cast_mut().cast();
                self.strings.push(string);
                Ok(pointer)
            }
            Arg::Texts(texts) if is_const && pointee == Pointee::Typed(Primitive::Pointer) => {
                self.keep_string_list(name, texts)
            }
            Arg::Values(values) if is_const => {
                let buffer = values_to_buffer(name, pointee, values)?;
                Ok(self.keep_input(buffer))
            }
            _ => Err(kind_error(name, expected, arg)),
        }
    }

    fn input_array(
        &mut self,
        array: &ArrayBinding,
        arg: &mut Arg,
    ) -> Result<(*mut c_void, usize), ArgumentError> {
        let name = &array.array_name;
        if array.pointer == 2 {
            return match arg {
                Arg::Texts(texts) => Ok((self.keep_string_list(name, texts)?, texts.len())),
                Arg::Null => Ok((std::ptr::null_mut(), 0)),
                _ => Err(kind_error(name, "a list of strings", arg)),
            };
        }
        match arg {
            Arg::Null => Ok((std::ptr::null_mut(), 0)),
            Arg::Buffer(buffer) => {
                let size = buffer_size(array, *buffer)?;
                Ok((buffer.as_ptr().cast_mut(), size))
            }
            Arg::BufferMut(buffer) => {
                let size = buffer_size(array, &**buffer)?;
                Ok((buffer.as_mut_ptr(), size))
            }
            Arg::Values(values) => {
                let buffer = values_to_buffer(name, array.pointee, values)?;
                let size = buffer_size(array, &buffer)?;
                Ok((self.keep_input(buffer), size))
            }
            Arg::Text(text) if array.pointee == Pointee::Text => {
                let buffer = TypedBuffer::UInt8(text.as_bytes().to_vec());
                let size = buffer_size(array, &buffer)?;
                Ok((self.keep_input(buffer), size))
            }
            _ => Err(kind_error(name, "a buffer or a list of values", arg)),
        }
    }

    fn output_array(
        &mut self,
        array: &ArrayBinding,
        arg: &mut Arg,
    ) -> Result<(*mut c_void, usize), ArgumentError> {
        let name = &array.array_name;
        match arg {
            Arg::BufferMut(buffer) => {
                let size = buffer_size(array, &**buffer)?;
                Ok((buffer.as_mut_ptr(), size))
            }
            &mut Arg::Int(n) => {
                let count = usize::try_from(n).map_err(|_| ArgumentError::ValueOutOfRange {
                    parameter: array.size_name.clone(),
                    value: n.to_string(),
                    primitive: array.size_primitive,
                })?;
                let shape = match array.pointee {
                    Pointee::Untyped => return Err(ArgumentError::BufferRequired(name.clone())),
                    Pointee::Text => OutputShape::Text,
                    Pointee::Typed(_) if count >= SIZE_PARAMETER_THRESHOLD => OutputShape::Buffer,
                    Pointee::Typed(_) => OutputShape::List,
                };
                let len = count
                    .checked_mul(array.multiplier as usize)
                    .ok_or_else(|| ArgumentError::SizeOverflow {
                        parameter: array.size_name.clone(),
                        size: count,
                        primitive: array.size_primitive,
                    })?;
                let element_type = array.pointee.element_type().unwrap_or(Primitive::UInt8);
                let mut buffer = TypedBuffer::zeroed(element_type, len).unwrap_or_default();
                let pointer = buffer.as_mut_ptr();
                self.outputs.push((shape, buffer));
                Ok((pointer, count))
            }
            _ => Err(kind_error(name, "a writable buffer or a size", arg)),
        }
    }

    /// Collect the results of the call, given the native return value.
    ///
    /// # Safety
    ///
    /// If the command returns text, `ret` must be null or point to a
    /// NUL-terminated string.
    pub(super) unsafe fn finish(self, return_kind: ReturnKind, ret: RawValue) -> Option<Value> {
        let ret = match return_kind {
            ReturnKind::Void => None,
            ReturnKind::Scalar(_) => Value::from_raw(ret),
            ReturnKind::Pointer => {
                Some(Value::Pointer(ret.as_pointer().map_or(0, |p| p as usize)))
            }
            ReturnKind::Text => Some(Value::Text(
                ret.as_pointer()
                    .filter(|p| !p.is_null())
                    .map(|p| CStr::from_ptr(p.cast_const().cast()).to_string_lossy().into_owned()),
            )),
        };

        let mut outputs = Vec::with_capacity(self.outputs.len() + self.references.len());
        for (shape, buffer) in self.outputs {
            outputs.push(match shape {
                OutputShape::Text => Value::Text(Some(decode_text(&buffer))),
                OutputShape::List => Value::List(buffer.to_values()),
                OutputShape::Buffer => Value::Buffer(buffer),
            });
        }
        for reference in &self.references {
            outputs.extend(reference.get(0));
        }
        shape_result(ret, outputs)
    }
}

/// Text written into a byte buffer, up to the first NUL.
fn decode_text(buffer: &TypedBuffer) -> String {
    let bytes: Vec<u8> = match buffer {
        TypedBuffer::UInt8(bytes) => bytes.clone(),
        TypedBuffer::Int8(bytes) => bytes.iter().map(|&b| b as u8).collect(),
        _ => Vec::new(),
    };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Combine the return value and the outputs of a call into one result.
pub(super) fn shape_result(ret: Option<Value>, mut outputs: Vec<Value>) -> Option<Value> {
    match (ret, outputs.len()) {
        (None, 0) => None,
        (None, 1) => match outputs.pop() {
            Some(Value::List(mut list)) if list.len() == 1 => list.pop(),
            output => output,
        },
        (None, _) => Some(Value::List(outputs)),
        (Some(ret), 0) => Some(ret),
        (Some(ret), _) => {
            outputs.insert(0, ret);
            Some(Value::List(outputs))
        }
    }
}
