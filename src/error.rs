/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Error types for each layer of the crate.
//!
//! Parsing and resolution failures are fatal for the operation that produced
//! them. Binding failures are not errors at all, they are reported per command
//! as [crate::binding::SkipReason]. Call failures are [CallError].

use crate::buffer::Primitive;
use thiserror::Error;

/// A fatal problem with a registry document.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        source: quick_xml::Error,
    },
    #[error("could not read registry: {0}")]
    Io(#[from] std::io::Error),
    #[error("document ended inside <{0}>")]
    Truncated(String),
    #[error("root element is <{0}>, expected <registry>")]
    BadRoot(String),
    #[error("type {name} is defined twice for API {api:?}")]
    DuplicateType { name: String, api: Option<String> },
    #[error("enumerant {name} is defined twice for API {api:?} in the same block")]
    DuplicateEnum { name: String, api: Option<String> },
    #[error("command {0} is defined twice")]
    DuplicateCommand(String),
    #[error("unexpected <{tag}> in <{parent}>")]
    BadInterface { parent: String, tag: String },
    #[error("unexpected interface item <{0}>")]
    BadInterfaceItem(String),
    #[error("invalid integer literal {0:?}")]
    BadInteger(String),
    #[error("invalid API version {0:?}")]
    BadVersion(String),
    #[error("<{tag}> is missing the {attribute:?} attribute")]
    MissingAttribute {
        tag: String,
        attribute: &'static str,
    },
    #[error("<{0}> has no name")]
    MissingName(String),
    #[error("invalid extension support pattern {pattern:?}: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// A fatal problem while computing the API surface for a request.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("API {0:?} is not supported")]
    UnsupportedApi(String),
    #[error("enumerant {0} appears in more than one block for this API")]
    DuplicateEnum(String),
    #[error("{kind} {name} is required but not defined")]
    BrokenReference { kind: &'static str, name: String },
    #[error("unknown extension {0}")]
    UnknownExtension(String),
    #[error("extension {extension} is not supported by API {api:?}")]
    ExtensionNotSupported { extension: String, api: String },
}

/// Something wrong with the arguments passed to a bound command.
#[derive(Debug, Error, PartialEq)]
pub enum ArgumentError {
    #[error("expected {expected} arguments, got {given}")]
    Count { expected: usize, given: usize },
    #[error("parameter {parameter}: expected {expected}, got {given}")]
    Kind {
        parameter: String,
        expected: &'static str,
        given: &'static str,
    },
    #[error("parameter {parameter}: buffer holds {given:?} elements, expected {expected:?}")]
    ElementType {
        parameter: String,
        expected: Primitive,
        given: Primitive,
    },
    #[error("parameter {0}: a buffer is required for an untyped pointer")]
    BufferRequired(String),
    #[error("parameter {parameter}: length {len} is not a multiple of {multiplier}")]
    NotMultiple {
        parameter: String,
        len: usize,
        multiplier: u32,
    },
    #[error("parameter {0}: text contains a NUL byte")]
    InteriorNul(String),
    #[error("parameter {parameter}: size {size} does not fit in {primitive:?}")]
    SizeOverflow {
        parameter: String,
        size: usize,
        primitive: Primitive,
    },
    #[error("parameter {parameter}: value {value} is not representable as {primitive:?}")]
    ValueOutOfRange {
        parameter: String,
        value: String,
        primitive: Primitive,
    },
}

/// A failed call to a bound command.
#[derive(Debug, Error, PartialEq)]
pub enum CallError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error("{name} ({code:#06x}): {message}")]
    Native {
        code: u32,
        name: &'static str,
        message: &'static str,
    },
    #[error("unrecognized error code {0:#06x}")]
    UnrecognizedErrorCode(u32),
    #[error("glGetError is not available in this library")]
    ErrorCheckUnavailable,
    #[error("glGetError returned {0}, which is not an error code")]
    BadErrorCode(String),
    #[error("{0} is not bound")]
    NotBound(String),
    #[error("{command} did not return {expected}")]
    UnexpectedResult {
        command: String,
        expected: &'static str,
    },
    #[error("index {index} is out of range, there are {count}")]
    IndexOutOfRange { index: u32, count: i64 },
}

/// A native library could not be opened.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not load {path}: {source}")]
    Library {
        path: String,
        source: libloading::Error,
    },
    #[error("calling native functions is not implemented for this platform")]
    UnsupportedPlatform,
}

/// A session could not be set up.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("no API version was requested and the library does not report one")]
    UnknownVersion,
    #[error("API version {requested} was requested but the library only provides {available}")]
    VersionUnavailable {
        requested: crate::registry::ApiNumber,
        available: crate::registry::ApiNumber,
    },
}
