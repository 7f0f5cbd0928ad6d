/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! A [NativeLibrary] made of Rust closures.
//!
//! This stands in for a real OpenGL implementation wherever one isn't
//! available or wanted: tests, and tools that only need to see what calls are
//! made. The closures receive the raw arguments exactly as native code would,
//! including pointers into buffers owned by the caller.

use super::{NativeLibrary, NativeSymbol, RawValue};
use crate::buffer::Primitive;
use std::cell::RefCell;
use std::collections::HashMap;

pub type StubFunction = Box<dyn Fn(&[RawValue]) -> RawValue>;

#[derive(Default)]
pub struct StubLibrary {
    functions: Vec<(String, StubFunction)>,
    index: HashMap<String, usize>,
    /// Every call made, in order, if recording is enabled.
    log: Option<RefCell<Vec<(String, Vec<RawValue>)>>>,
}

impl StubLibrary {
    pub fn new() -> StubLibrary {
        StubLibrary::default()
    }

    /// Keep a record of every call. See [StubLibrary::calls].
    pub fn recording(mut self) -> StubLibrary {
        self.log = Some(RefCell::new(Vec::new()));
        self
    }

    /// Add or replace a function.
    pub fn insert<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&[RawValue]) -> RawValue + 'static,
    {
        match self.index.get(name) {
            Some(&i) => self.functions[i].1 = Box::new(function),
            None => {
                self.index.insert(name.to_string(), self.functions.len());
                self.functions.push((name.to_string(), Box::new(function)));
            }
        }
    }

    pub fn with_function<F>(mut self, name: &str, function: F) -> StubLibrary
    where
        F: Fn(&[RawValue]) -> RawValue + 'static,
    {
        self.insert(name, function);
        self
    }

    /// The calls made so far, if recording.
    pub fn calls(&self) -> Vec<(String, Vec<RawValue>)> {
        self.log
            .as_ref()
            .map(|log| log.borrow().clone())
            .unwrap_or_default()
    }
}

impl NativeLibrary for StubLibrary {
    fn lookup(&self, name: &str) -> Option<NativeSymbol> {
        self.index.get(name).copied().map(NativeSymbol)
    }

    unsafe fn invoke(&self, symbol: NativeSymbol, args: &[RawValue], ret: Primitive) -> RawValue {
        let (name, function) = &self.functions[symbol.0];
        if let Some(log) = &self.log {
            log.borrow_mut().push((name.clone(), args.to_vec()));
        }
        let value = function(args);
        if value.primitive() != ret {
            log!(
                "{} returned {:?}, but {:?} was expected",
                name,
                value,
                ret
            );
            return RawValue::zero(ret);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table() {
        let mut library = StubLibrary::new()
            .recording()
            .with_function("glGetError", |_| RawValue::UInt32(0x0500));
        library.insert("glAdd", |args| {
            RawValue::Int32((args[0].as_i64().unwrap() + args[1].as_i64().unwrap()) as i32)
        });

        let add = library.lookup("glAdd").unwrap();
        assert!(library.lookup("glMissing").is_none());
        let result = unsafe {
            library.invoke(add, &[RawValue::Int32(2), RawValue::Int32(3)], Primitive::Int32)
        };
        assert_eq!(result, RawValue::Int32(5));

        // mismatched return types don't leak through
        let get_error = library.lookup("glGetError").unwrap();
        assert_eq!(
            unsafe { library.invoke(get_error, &[], Primitive::Int64) },
            RawValue::Int64(0)
        );

        let calls = library.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "glAdd");
        assert_eq!(calls[0].1, vec![RawValue::Int32(2), RawValue::Int32(3)]);
    }
}
