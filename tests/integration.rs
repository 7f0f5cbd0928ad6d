/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! End-to-end tests: registry text in, calls through a stub library out.

use dynGL::abi::{NativeLibrary, RawValue, StubLibrary};
use dynGL::binding::{Arg, Marshaller, SkipReason, Value};
use dynGL::buffer::TypedBuffer;
use dynGL::error::{ArgumentError, CallError};
use dynGL::namespace::{Session, Symbol};
use dynGL::options::Options;
use dynGL::registry::{ApiNumber, Registry};
use dynGL::resolver::Resolver;
use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::rc::Rc;

const TEST_REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<registry>
    <comment>A tiny API for testing</comment>
    <types>
        <type>typedef unsigned int <name>GLuint</name>;</type>
        <type>typedef int <name>GLint</name>;</type>
        <type>typedef int <name>GLsizei</name>;</type>
        <type>typedef char <name>GLchar</name>;</type>
    </types>
    <enums namespace="Test" group="TestEnums">
        <enum value="0x10" name="TEST_ENUM"/>
        <enum value="0x20" name="TEST_EXTRA"/>
    </enums>
    <commands namespace="Test">
        <command>
            <proto>void <name>testFunc</name></proto>
            <param>int <name>n</name></param>
            <param len="n">unsigned int *<name>out</name></param>
        </command>
        <command>
            <proto>void <name>testSource</name></proto>
            <param><ptype>GLuint</ptype> <name>shader</name></param>
            <param><ptype>GLsizei</ptype> <name>count</name></param>
            <param len="count">const <ptype>GLchar</ptype> *const*<name>string</name></param>
            <param len="count">const <ptype>GLint</ptype> *<name>length</name></param>
        </command>
        <command>
            <proto>void <name>testGetLog</name></proto>
            <param><ptype>GLuint</ptype> <name>object</name></param>
            <param><ptype>GLsizei</ptype> <name>bufSize</name></param>
            <param len="1"><ptype>GLsizei</ptype> *<name>length</name></param>
            <param len="bufSize"><ptype>GLchar</ptype> *<name>infoLog</name></param>
        </command>
        <command>
            <proto><ptype>GLuint</ptype> <name>testCreate</name></proto>
            <param><ptype>GLsizei</ptype> <name>n</name></param>
            <param len="n"><ptype>GLuint</ptype> *<name>ids</name></param>
        </command>
        <command>
            <proto>void <name>testExtra</name></proto>
        </command>
    </commands>
    <feature api="test" name="TEST_VERSION_1_0" number="1.0">
        <require>
            <enum name="TEST_ENUM"/>
            <command name="testFunc"/>
            <command name="testSource"/>
            <command name="testGetLog"/>
            <command name="testCreate"/>
        </require>
    </feature>
    <extensions>
        <extension name="TEST_extra" supported="test|other">
            <require>
                <enum name="TEST_EXTRA"/>
                <command name="testExtra"/>
            </require>
        </extension>
    </extensions>
</registry>
"#;

fn test_options() -> Options {
    let mut options = Options::default();
    for arg in [
        "--api=test",
        "--apis=test",
        "--version=1.0",
        // the strings are NUL-terminated
        "--null-parameter=testSource:length",
    ] {
        assert_eq!(options.parse_argument(arg), Ok(true));
    }
    options
}

/// Writes `i * i` to element `i`.
fn squares(args: &[RawValue]) -> RawValue {
    let n = args[0].as_i64().unwrap() as usize;
    let out = args[1].as_pointer().unwrap().cast::<u32>();
    for i in 0..n {
        unsafe { out.add(i).write((i * i) as u32) };
    }
    RawValue::Void
}

fn test_library(sources: Rc<RefCell<Vec<String>>>) -> Rc<dyn NativeLibrary> {
    Rc::new(
        StubLibrary::new()
            .with_function("testFunc", squares)
            .with_function("testSource", move |args| {
                let count = args[1].as_i64().unwrap() as usize;
                let strings = args[2].as_pointer().unwrap().cast::<*const c_char>();
                assert!(args[3].as_pointer().unwrap().is_null());
                for i in 0..count {
                    let text = unsafe { CStr::from_ptr(*strings.add(i)) };
                    sources.borrow_mut().push(text.to_str().unwrap().to_string());
                }
                RawValue::Void
            })
            .with_function("testGetLog", |args| {
                let size = args[1].as_i64().unwrap() as usize;
                let length = args[2].as_pointer().unwrap().cast::<i32>();
                let log = args[3].as_pointer().unwrap().cast::<u8>();
                let message = b"ok\0";
                assert!(size >= message.len());
                unsafe {
                    std::ptr::copy_nonoverlapping(message.as_ptr(), log, message.len());
                    length.write(2);
                }
                RawValue::Void
            })
            .with_function("testCreate", |args| {
                squares(args);
                RawValue::UInt32(7)
            })
            .with_function("testExtra", |_| RawValue::Void),
    )
}

#[test]
fn scenario() {
    let registry = Registry::parse(TEST_REGISTRY).unwrap();
    let sources = Rc::new(RefCell::new(Vec::new()));
    let session = Session::new(&registry, test_library(sources), &test_options()).unwrap();
    assert_eq!(session.api().version, ApiNumber::new(1, 0));

    let test = session.namespace();
    assert_eq!(test.enum_value("TEST_ENUM"), Some(0x10));
    assert!(matches!(test.get("TEST_ENUM"), Some(Symbol::Enum(0x10))));
    // not required by the feature
    assert_eq!(test.enum_value("TEST_EXTRA"), None);
    assert!(test.command("testExtra").is_none());
    assert!(test.skipped().is_empty());

    let test_func = test.command("testFunc").unwrap();
    assert_eq!(test_func.arity(), 1);
    assert!(matches!(
        test_func.classification().marshallers[..],
        [Marshaller::OutputArray(_)]
    ));
    let result = test_func.call([Arg::from(5)]).unwrap();
    assert_eq!(
        result,
        Some(Value::List(
            [0, 1, 4, 9, 16].into_iter().map(Value::UInt).collect()
        ))
    );
    assert_eq!(test_func.call_count(), 1);
}

/// The smallest registry that does anything: one enumerant, one command.
const MINIMAL_REGISTRY: &str = r#"<registry>
    <enums namespace="Test">
        <enum value="0x10" name="TEST_ENUM"/>
    </enums>
    <commands namespace="Test">
        <command>
            <proto>void <name>testFunc</name></proto>
            <param>int <name>n</name></param>
            <param len="n">unsigned int *<name>out</name></param>
        </command>
    </commands>
    <feature api="test" name="TEST_VERSION_1_0" number="1.0">
        <require>
            <enum name="TEST_ENUM"/>
            <command name="testFunc"/>
        </require>
    </feature>
</registry>
"#;

#[test]
fn minimal_scenario() {
    let registry = Registry::parse(MINIMAL_REGISTRY).unwrap();
    let api = Resolver::new(&registry)
        .with_apis(["test"])
        .generate_api("test", ApiNumber::new(1, 0), None)
        .unwrap();
    assert_eq!(api.enums.names().collect::<Vec<_>>(), ["TEST_ENUM"]);
    assert_eq!(api.enums.value("TEST_ENUM"), Some(16));
    assert_eq!(api.commands.names().collect::<Vec<_>>(), ["testFunc"]);

    let library: Rc<dyn NativeLibrary> =
        Rc::new(StubLibrary::new().with_function("testFunc", squares));
    let session = Session::new(&registry, library, &test_options()).unwrap();
    let test = session.namespace();
    assert_eq!(test.enum_names().collect::<Vec<_>>(), ["TEST_ENUM"]);
    assert_eq!(
        test.commands().map(|c| c.name()).collect::<Vec<_>>(),
        ["testFunc"]
    );
    assert!(test.skipped().is_empty());

    let test_func = test.command("testFunc").unwrap();
    let Marshaller::OutputArray(array) = &test_func.classification().marshallers[0] else {
        panic!("{}", test_func.signature());
    };
    assert_eq!((array.size_name.as_str(), array.array_name.as_str()), ("n", "out"));
    assert_eq!(
        test_func.call([Arg::from(5)]).unwrap(),
        Some(Value::List(
            [0, 1, 4, 9, 16].into_iter().map(Value::UInt).collect()
        ))
    );
    assert_eq!(test_func.call([Arg::from(0)]).unwrap(), Some(Value::List(Vec::new())));
}

#[test]
fn size_threshold() {
    let registry = Registry::parse(TEST_REGISTRY).unwrap();
    let session = Session::new(&registry, test_library(Rc::default()), &test_options()).unwrap();
    let test_func = session.namespace().command("testFunc").unwrap();

    let Some(Value::List(small)) = test_func.call([Arg::from(19)]).unwrap() else {
        panic!("19 elements should be returned as a list");
    };
    assert_eq!(small.len(), 19);
    assert_eq!(small[18], Value::UInt(18 * 18));

    let Some(Value::Buffer(mut large)) = test_func.call([Arg::from(20)]).unwrap() else {
        panic!("20 elements should be returned as a buffer");
    };
    assert_eq!(large, TypedBuffer::UInt32((0..20).map(|i| i * i).collect()));
    // the buffer belongs to the caller now
    large.resize(25);
    assert_eq!(large.get(24), Some(Value::UInt(0)));
}

#[test]
fn string_lists_and_text() {
    let registry = Registry::parse(TEST_REGISTRY).unwrap();
    let sources = Rc::new(RefCell::new(Vec::new()));
    let session = Session::new(&registry, test_library(sources.clone()), &test_options()).unwrap();
    let test = session.namespace();

    let source = test.command("testSource").unwrap();
    assert_eq!(source.arity(), 2);
    let lines = ["void main() {", "}"];
    assert_eq!(source.call([Arg::from(3), Arg::from(&lines[..])]), Ok(None));
    assert_eq!(*sources.borrow(), lines);

    assert_eq!(
        source.call([Arg::from(3), Arg::from(5)]),
        Err(CallError::Argument(ArgumentError::Kind {
            parameter: "string".to_string(),
            expected: "a list of strings",
            given: "an integer",
        }))
    );
    assert!(matches!(
        source.call([Arg::from(3), Arg::from(&["a\0b"][..])]),
        Err(CallError::Argument(ArgumentError::InteriorNul(_)))
    ));

    // array outputs come first, then references
    let log = test.command("testGetLog").unwrap();
    assert_eq!(log.arity(), 2);
    assert_eq!(
        log.call([Arg::from(1), Arg::from(64)]).unwrap(),
        Some(Value::List(vec![
            Value::Text(Some("ok".to_string())),
            Value::Int(2)
        ]))
    );
}

#[test]
fn return_value_and_outputs() {
    let registry = Registry::parse(TEST_REGISTRY).unwrap();
    let session = Session::new(&registry, test_library(Rc::default()), &test_options()).unwrap();
    let create = session.namespace().command("testCreate").unwrap();
    assert_eq!(
        create.call([Arg::from(2)]).unwrap(),
        Some(Value::List(vec![
            Value::UInt(7),
            Value::List(vec![Value::UInt(0), Value::UInt(1)])
        ]))
    );

    let mut ids = vec![0u32; 3];
    assert_eq!(
        create.call([Arg::from(&mut ids)]).unwrap(),
        Some(Value::UInt(7))
    );
    assert_eq!(ids, [0, 1, 4]);

    let mut wrong = vec![0i32; 3];
    assert!(matches!(
        create.call([Arg::from(&mut wrong)]),
        Err(CallError::Argument(ArgumentError::ElementType { .. }))
    ));
    assert!(matches!(
        create.call([Arg::from(1), Arg::from(2)]),
        Err(CallError::Argument(ArgumentError::Count {
            expected: 1,
            given: 2
        }))
    ));
}

#[test]
fn extensions() {
    let registry = Registry::parse(TEST_REGISTRY).unwrap();
    let mut options = test_options();
    assert_eq!(options.parse_argument("--extension=TEST_extra"), Ok(true));
    let session = Session::new(&registry, test_library(Rc::default()), &options).unwrap();
    assert_eq!(session.api().extensions(), ["TEST_extra"]);
    let test = session.namespace();
    assert_eq!(test.enum_value("TEST_EXTRA"), Some(0x20));
    assert!(test.command("testExtra").is_some());

    assert_eq!(options.parse_argument("--extension=TEST_missing"), Ok(true));
    assert!(Session::new(&registry, test_library(Rc::default()), &options).is_err());
}

#[test]
fn missing_symbols_are_skipped() {
    let registry = Registry::parse(TEST_REGISTRY).unwrap();
    let library: Rc<dyn NativeLibrary> =
        Rc::new(StubLibrary::new().with_function("testFunc", squares));
    let session = Session::new(&registry, library, &test_options()).unwrap();
    let test = session.namespace();
    assert_eq!(test.commands().count(), 1);
    let skipped: Vec<&str> = test.skipped().iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(skipped, ["testCreate", "testGetLog", "testSource"]);
    assert!(test
        .skipped()
        .iter()
        .all(|(_, reason)| matches!(reason, SkipReason::NotAvailable(_))));
}

#[test]
fn bundled_registry() {
    let registry = Registry::bundled_gl().unwrap();
    let resolver = Resolver::new(&registry);

    let core = resolver
        .generate_api("gl", ApiNumber::new(3, 3), Some("core"))
        .unwrap();
    let compatibility = resolver
        .generate_api("gl", ApiNumber::new(3, 3), Some("compatibility"))
        .unwrap();
    assert_eq!(core.enums.value("GL_ARRAY_BUFFER"), Some(0x8892));
    assert!(core.commands.contains("glGenBuffers"));
    assert!(!core.commands.contains("glBegin"));
    assert!(compatibility.commands.contains("glBegin"));
    assert!(core.commands.len() < compatibility.commands.len());

    let gles = resolver
        .generate_api("gles2", ApiNumber::new(2, 0), None)
        .unwrap();
    assert!(gles.commands.contains("glShaderSource"));
    assert!(!gles.commands.contains("glBegin"));

    // Bind a handful of commands, everything else is missing.
    let library: Rc<dyn NativeLibrary> = Rc::new(
        StubLibrary::new()
            .with_function("glGenBuffers", squares)
            .with_function("glShaderSource", |_| RawValue::Void),
    );
    let mut options = Options::default();
    options.version = Some(ApiNumber::new(3, 3));
    options.profile = Some("core".to_string());
    let session = Session::new(&registry, library, &options).unwrap();
    let gl = session.namespace();
    assert_eq!(gl.commands().count(), 2);
    assert_eq!(gl.skipped().len(), core.commands.len() - 2);

    let gen_buffers = gl.command("glGenBuffers").unwrap();
    assert_eq!(
        gen_buffers.call([Arg::from(3)]).unwrap(),
        Some(Value::List(vec![
            Value::UInt(0),
            Value::UInt(1),
            Value::UInt(4)
        ]))
    );
    let shader_source = gl.command("glShaderSource").unwrap();
    assert_eq!(shader_source.arity(), 2);
    assert!(matches!(
        shader_source.classification().marshallers[..],
        [
            Marshaller::PlainValue { .. },
            Marshaller::InputArray(_),
            Marshaller::Null { location: 3, .. }
        ]
    ));
}
