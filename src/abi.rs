/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The boundary with native code: raw values, symbol tables, and calling
//! conventions.
//!
//! A [NativeLibrary] is anything that can look up a function by name and call
//! it with a list of [RawValue]s. [DynamicLibrary] is the real thing, backed by
//! a shared library loaded at runtime. [StubLibrary] is an in-process table of
//! Rust closures, for testing and tooling.
//!
//! Calling a function whose signature is only known at runtime needs some
//! knowledge of the calling convention. On the platforms supported here,
//! integer-class arguments (integers and pointers) and floating-point
//! arguments are assigned to two independent sequences of registers, in order,
//! and excess integer-class arguments go to the stack in 8-byte slots. That
//! means a single native signature with enough integer and floating-point
//! parameters can call any function that fits within it: the callee simply
//! ignores the registers it doesn't use. See [assign_registers].
//!
//! Useful resources:
//! * [System V AMD64 ABI](https://gitlab.com/x86-psABIs/x86-64-ABI), section 3.2.3 "Parameter Passing".
//! * Arm's [Procedure Call Standard for the Arm 64-bit Architecture (AAPCS64)](https://github.com/ARM-software/abi-aa/blob/main/aapcs64/aapcs64.rst).

mod dynamic;
mod stub;

pub use dynamic::DynamicLibrary;
pub use stub::{StubFunction, StubLibrary};

use crate::buffer::Primitive;
use std::ffi::c_void;

/// Maximum number of integer-class arguments (integers and pointers).
pub const MAX_INTEGER_ARGS: usize = 16;
/// Maximum number of floating-point arguments. This is the number of vector
/// registers used for arguments, so they never spill to the stack.
pub const MAX_FLOAT_ARGS: usize = 8;

/// An argument or return value at the machine level.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RawValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Pointer(*mut c_void),
    Void,
}

/// Where a [RawValue] is passed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Register {
    Integer(u64),
    Float(f64),
}

impl RawValue {
    pub fn primitive(&self) -> Primitive {
        match self {
            RawValue::Int8(_) => Primitive::Int8,
            RawValue::UInt8(_) => Primitive::UInt8,
            RawValue::Int16(_) => Primitive::Int16,
            RawValue::UInt16(_) => Primitive::UInt16,
            RawValue::Int32(_) => Primitive::Int32,
            RawValue::UInt32(_) => Primitive::UInt32,
            RawValue::Int64(_) => Primitive::Int64,
            RawValue::UInt64(_) => Primitive::UInt64,
            RawValue::Float(_) => Primitive::Float,
            RawValue::Double(_) => Primitive::Double,
            RawValue::Pointer(_) => Primitive::Pointer,
            RawValue::Void => Primitive::Void,
        }
    }

    pub fn zero(primitive: Primitive) -> RawValue {
        RawValue::from_integer_register(primitive, 0)
    }

    /// The register contents for this value. Integers are sign- or
    /// zero-extended to 64 bits, which is what callees may assume for narrow
    /// types. A `float` occupies the low 32 bits of its register.
    pub fn to_register(&self) -> Option<Register> {
        Some(match *self {
            RawValue::Int8(v) => Register::Integer(i64::from(v) as u64),
            RawValue::UInt8(v) => Register::Integer(v.into()),
            RawValue::Int16(v) => Register::Integer(i64::from(v) as u64),
            RawValue::UInt16(v) => Register::Integer(v.into()),
            RawValue::Int32(v) => Register::Integer(i64::from(v) as u64),
            RawValue::UInt32(v) => Register::Integer(v.into()),
            RawValue::Int64(v) => Register::Integer(v as u64),
            RawValue::UInt64(v) => Register::Integer(v),
            RawValue::Float(v) => Register::Float(f64::from_bits(u64::from(v.to_bits()))),
            RawValue::Double(v) => Register::Float(v),
            RawValue::Pointer(p) => Register::Integer(p as usize as u64),
            RawValue::Void => return None,
        })
    }

    /// Interpret the contents of an integer return register. Bits above the
    /// width of the type are ignored.
    pub fn from_integer_register(primitive: Primitive, bits: u64) -> RawValue {
        match primitive {
            Primitive::Int8 => RawValue::Int8(bits as i8),
            Primitive::UInt8 => RawValue::UInt8(bits as u8),
            Primitive::Int16 => RawValue::Int16(bits as i16),
            Primitive::UInt16 => RawValue::UInt16(bits as u16),
            Primitive::Int32 => RawValue::Int32(bits as i32),
            Primitive::UInt32 => RawValue::UInt32(bits as u32),
            Primitive::Int64 => RawValue::Int64(bits as i64),
            Primitive::UInt64 => RawValue::UInt64(bits),
            Primitive::Float => RawValue::Float(f32::from_bits(bits as u32)),
            Primitive::Double => RawValue::Double(f64::from_bits(bits)),
            Primitive::Pointer => RawValue::Pointer(bits as usize as *mut c_void),
            Primitive::Void => RawValue::Void,
        }
    }

    /// Interpret the contents of a floating-point return register.
    pub fn from_float_register(primitive: Primitive, value: f64) -> RawValue {
        match primitive {
            Primitive::Float => RawValue::Float(f32::from_bits(value.to_bits() as u32)),
            Primitive::Double => RawValue::Double(value),
            other => RawValue::from_integer_register(other, value.to_bits()),
        }
    }

    /// Integer value, for integers and pointers. Unsigned 64-bit values keep
    /// their bits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            RawValue::Int8(v) => Some(v.into()),
            RawValue::UInt8(v) => Some(v.into()),
            RawValue::Int16(v) => Some(v.into()),
            RawValue::UInt16(v) => Some(v.into()),
            RawValue::Int32(v) => Some(v.into()),
            RawValue::UInt32(v) => Some(v.into()),
            RawValue::Int64(v) => Some(v),
            RawValue::UInt64(v) => Some(v as i64),
            RawValue::Pointer(p) => Some(p as usize as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            RawValue::Float(v) => Some(v.into()),
            RawValue::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<*mut c_void> {
        match *self {
            RawValue::Pointer(p) => Some(p),
            _ => None,
        }
    }
}

/// Register assignment for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Registers {
    pub integer: [u64; MAX_INTEGER_ARGS],
    pub float: [f64; MAX_FLOAT_ARGS],
}

/// Assign each argument to the next free register of its class. Returns `None`
/// if there are too many of either class, or if an argument is `Void`.
pub fn assign_registers(args: &[RawValue]) -> Option<Registers> {
    let mut registers = Registers {
        integer: [0; MAX_INTEGER_ARGS],
        float: [0.0; MAX_FLOAT_ARGS],
    };
    let mut integer_count = 0;
    let mut float_count = 0;
    for arg in args {
        match arg.to_register()? {
            Register::Integer(bits) => {
                *registers.integer.get_mut(integer_count)? = bits;
                integer_count += 1;
            }
            Register::Float(value) => {
                *registers.float.get_mut(float_count)? = value;
                float_count += 1;
            }
        }
    }
    Some(registers)
}

/// Whether a signature fits within [MAX_INTEGER_ARGS] and [MAX_FLOAT_ARGS].
pub fn fits_registers(parameters: &[Primitive]) -> Result<(), String> {
    if parameters.contains(&Primitive::Void) {
        return Err("a parameter has type void".to_string());
    }
    let float_count = parameters.iter().filter(|p| p.is_float()).count();
    let integer_count = parameters.len() - float_count;
    if integer_count > MAX_INTEGER_ARGS {
        return Err(format!(
            "{} integer arguments, at most {} are supported",
            integer_count, MAX_INTEGER_ARGS
        ));
    }
    if float_count > MAX_FLOAT_ARGS {
        return Err(format!(
            "{} floating-point arguments, at most {} are supported",
            float_count, MAX_FLOAT_ARGS
        ));
    }
    Ok(())
}

/// A function found in a [NativeLibrary]. What the number means is up to the
/// library, e.g. an address or a table index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeSymbol(pub usize);

/// A table of native functions, keyed by symbol name.
pub trait NativeLibrary {
    fn lookup(&self, name: &str) -> Option<NativeSymbol>;

    /// Whether functions with this signature can be called at all. The default
    /// is that everything can.
    fn check_signature(&self, parameters: &[Primitive], ret: Primitive) -> Result<(), String> {
        let _ = (parameters, ret);
        Ok(())
    }

    /// Call a function.
    ///
    /// # Safety
    ///
    /// The arguments and return type must match what the native function
    /// expects, and every pointer must be valid for whatever the function does
    /// with it.
    unsafe fn invoke(&self, symbol: NativeSymbol, args: &[RawValue], ret: Primitive) -> RawValue;
}
