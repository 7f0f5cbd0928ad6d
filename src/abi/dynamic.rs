/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Shared libraries loaded at runtime, e.g. `libGL.so.1`.

use super::{assign_registers, fits_registers, NativeLibrary, NativeSymbol, RawValue};
use crate::buffer::Primitive;
use crate::error::LoadError;
use std::ffi::{c_char, c_void, CString};

/// `glXGetProcAddressARB`, `eglGetProcAddress` and friends.
type GetProcAddress = unsafe extern "C" fn(*const c_char) -> *const c_void;

pub struct DynamicLibrary {
    path: String,
    library: libloading::Library,
    get_proc_address: Option<GetProcAddress>,
}

impl DynamicLibrary {
    /// The usual name of the OpenGL library on this platform.
    pub const DEFAULT_PATH: &'static str = if cfg!(target_os = "macos") {
        "/System/Library/Frameworks/OpenGL.framework/OpenGL"
    } else if cfg!(windows) {
        "opengl32.dll"
    } else {
        "libGL.so.1"
    };

    pub fn open(path: &str) -> Result<DynamicLibrary, LoadError> {
        if !calls_supported() {
            return Err(LoadError::UnsupportedPlatform);
        }
        // Safety: loading a library runs its initialisers. There's nothing we
        // can check about that, the user chose the library.
        let library = unsafe { libloading::Library::new(path) }.map_err(|source| {
            LoadError::Library {
                path: path.to_string(),
                source,
            }
        })?;
        log_dbg!("Loaded {}", path);
        Ok(DynamicLibrary {
            path: path.to_string(),
            library,
            get_proc_address: None,
        })
    }

    /// Also look up functions through a "get proc address" function exported
    /// by the library, for functions that are not exported directly.
    pub fn with_loader(mut self, loader: &str) -> DynamicLibrary {
        // Safety: the loader functions all have this signature.
        match unsafe { self.library.get::<GetProcAddress>(loader.as_bytes()) } {
            Ok(symbol) => self.get_proc_address = Some(*symbol),
            Err(err) => log!("{} has no {}: {}", self.path, loader, err),
        }
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl NativeLibrary for DynamicLibrary {
    fn lookup(&self, name: &str) -> Option<NativeSymbol> {
        // Safety: only the address is taken, nothing is called yet.
        let address = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }
            .ok()
            .map(|symbol| *symbol)
            .filter(|address| !address.is_null())
            .map(|address| address as usize);
        if address.is_some() {
            return address.map(NativeSymbol);
        }

        let get_proc_address = self.get_proc_address?;
        let name = CString::new(name).ok()?;
        // Safety: the name is a valid C string, and the loader doesn't keep it.
        let address = unsafe { get_proc_address(name.as_ptr()) };
        if address.is_null() {
            None
        } else {
            Some(NativeSymbol(address as usize))
        }
    }

    fn check_signature(&self, parameters: &[Primitive], _ret: Primitive) -> Result<(), String> {
        fits_registers(parameters)
    }

    unsafe fn invoke(&self, symbol: NativeSymbol, args: &[RawValue], ret: Primitive) -> RawValue {
        // check_signature has already been consulted for every bound command
        let Some(registers) = assign_registers(args) else {
            panic!("{} arguments don't fit in registers", args.len());
        };
        trampoline::call(symbol.0, &registers, ret)
    }
}

fn calls_supported() -> bool {
    cfg!(any(
        all(target_arch = "x86_64", not(windows)),
        all(target_arch = "aarch64", not(target_vendor = "apple"))
    ))
}

#[cfg(any(
    all(target_arch = "x86_64", not(windows)),
    all(target_arch = "aarch64", not(target_vendor = "apple"))
))]
mod trampoline {
    use super::super::{RawValue, Registers};
    use crate::buffer::Primitive;

    type IntegerReturning = unsafe extern "C" fn(
        u64, u64, u64, u64, u64, u64, u64, u64,
        u64, u64, u64, u64, u64, u64, u64, u64,
        f64, f64, f64, f64, f64, f64, f64, f64,
    ) -> u64;
    type FloatReturning = unsafe extern "C" fn(
        u64, u64, u64, u64, u64, u64, u64, u64,
        u64, u64, u64, u64, u64, u64, u64, u64,
        f64, f64, f64, f64, f64, f64, f64, f64,
    ) -> f64;

    pub(super) unsafe fn call(address: usize, registers: &Registers, ret: Primitive) -> RawValue {
        let [i0, i1, i2, i3, i4, i5, i6, i7, i8, i9, i10, i11, i12, i13, i14, i15] =
            registers.integer;
        let [f0, f1, f2, f3, f4, f5, f6, f7] = registers.float;
        if ret.is_float() {
            let function: FloatReturning = std::mem::transmute::<usize, FloatReturning>(address);
            let value = function(
                i0, i1, i2, i3, i4, i5, i6, i7, i8, i9, i10, i11, i12, i13, i14, i15, f0, f1, f2,
                f3, f4, f5, f6, f7,
            );
            RawValue::from_float_register(ret, value)
        } else {
            let function: IntegerReturning =
                std::mem::transmute::<usize, IntegerReturning>(address);
            let bits = function(
                i0, i1, i2, i3, i4, i5, i6, i7, i8, i9, i10, i11, i12, i13, i14, i15, f0, f1, f2,
                f3, f4, f5, f6, f7,
            );
            RawValue::from_integer_register(ret, bits)
        }
    }
}

#[cfg(not(any(
    all(target_arch = "x86_64", not(windows)),
    all(target_arch = "aarch64", not(target_vendor = "apple"))
)))]
mod trampoline {
    use super::super::{RawValue, Registers};
    use crate::buffer::Primitive;

    pub(super) unsafe fn call(_address: usize, _registers: &Registers, _ret: Primitive) -> RawValue {
        // DynamicLibrary::open refuses to load anything on these platforms.
        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn add_mixed(a: i32, x: f32, b: u8, y: f64) -> f64 {
        f64::from(a) + f64::from(x) + f64::from(b) + y
    }

    extern "C" fn narrow(a: i16, b: u64) -> i16 {
        a.wrapping_add(b as i16)
    }

    extern "C" fn halve(x: f32) -> f32 {
        x / 2.0
    }

    #[test]
    #[cfg(any(
        all(target_arch = "x86_64", not(windows)),
        all(target_arch = "aarch64", not(target_vendor = "apple"))
    ))]
    fn trampoline_calls() {
        let call = |f: usize, args: &[RawValue], ret| unsafe {
            trampoline::call(f, &assign_registers(args).unwrap(), ret)
        };
        assert_eq!(
            call(
                add_mixed as usize,
                &[
                    RawValue::Int32(-3),
                    RawValue::Float(0.5),
                    RawValue::UInt8(200),
                    RawValue::Double(0.25)
                ],
                Primitive::Double
            ),
            RawValue::Double(197.75)
        );
        assert_eq!(
            call(
                narrow as usize,
                &[RawValue::Int16(-2), RawValue::UInt64(5)],
                Primitive::Int16
            ),
            RawValue::Int16(3)
        );
        assert_eq!(
            call(halve as usize, &[RawValue::Float(3.0)], Primitive::Float),
            RawValue::Float(1.5)
        );
    }

    #[test]
    fn missing_library() {
        let result = DynamicLibrary::open("/nonexistent/libdynGL-test.so");
        if calls_supported() {
            assert!(matches!(result, Err(LoadError::Library { .. })));
        } else {
            assert!(matches!(result, Err(LoadError::UnsupportedPlatform)));
        }
    }
}
