/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Binding registry commands to native functions.
//!
//! Binding a command looks up its symbol in a [NativeLibrary] and decides,
//! once, how each parameter is marshalled (see [classify()]). The result is a
//! [BoundCommand] that can be called with high-level [Arg]s and returns
//! high-level [Value]s.
//!
//! Commands that can't be bound aren't errors: they're reported with a
//! [SkipReason], and the rest of the API works without them.
//!
//! Calling a bound command trusts the registry: the native function is called
//! with the signature the registry gives, and with pointers whose sizes the
//! registry implies. Arguments that contradict the registry are rejected, but
//! nothing can be checked about what the native side then does.

mod classify;
mod marshal;
mod value;

pub use classify::{
    classify, ArrayBinding, Classification, Directives, Marshaller, Pointee, ReturnKind,
};
pub use value::{Arg, Value};

use crate::abi::{NativeLibrary, NativeSymbol, RawValue};
use crate::buffer::Primitive;
use crate::error::CallError;
use crate::registry::Command;
use marshal::Frame;
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

/// Output arrays of at least this many elements are returned as a
/// [Value::Buffer] rather than a [Value::List].
pub const SIZE_PARAMETER_THRESHOLD: usize = 20;

/// Why a command was left out of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("{0} is not exported by the library")]
    NotAvailable(String),
    #[error("{0}")]
    NotSupported(String),
}

pub enum BindOutcome {
    Bound(BoundCommand),
    Skipped(SkipReason),
}

/// `glGetError` codes: (code, name, description).
pub const ERROR_CODES: &[(u32, &str, &str)] = &[
    (
        0x0500,
        "GL_INVALID_ENUM",
        "An unacceptable value is specified for an enumerated argument.",
    ),
    (
        0x0501,
        "GL_INVALID_VALUE",
        "A numeric argument is out of range.",
    ),
    (
        0x0502,
        "GL_INVALID_OPERATION",
        "The specified operation is not allowed in the current state.",
    ),
    (
        0x0503,
        "GL_STACK_OVERFLOW",
        "An attempt has been made to perform an operation that would cause an internal stack to overflow.",
    ),
    (
        0x0504,
        "GL_STACK_UNDERFLOW",
        "An attempt has been made to perform an operation that would cause an internal stack to underflow.",
    ),
    (
        0x0505,
        "GL_OUT_OF_MEMORY",
        "There is not enough memory left to execute the command.",
    ),
    (
        0x0506,
        "GL_INVALID_FRAMEBUFFER_OPERATION",
        "The framebuffer object is not complete.",
    ),
];

/// Map a `glGetError` code to a result. `GL_NO_ERROR` is zero.
pub fn error_for_code(code: u32) -> Result<(), CallError> {
    if code == 0 {
        return Ok(());
    }
    match ERROR_CODES.iter().find(|&&(c, _, _)| c == code) {
        Some(&(code, name, message)) => Err(CallError::Native {
            code,
            name,
            message,
        }),
        None => Err(CallError::UnrecognizedErrorCode(code)),
    }
}

/// Queries `glGetError` in the library that commands are bound to.
#[derive(Debug)]
pub struct ErrorChecker {
    get_error: Option<NativeSymbol>,
}

impl ErrorChecker {
    pub fn new(library: &dyn NativeLibrary) -> ErrorChecker {
        let get_error = library.lookup("glGetError");
        if get_error.is_none() {
            log_dbg!("glGetError is not available, errors can't be checked");
        }
        ErrorChecker { get_error }
    }

    /// Fetch and clear the current error.
    pub fn check(&self, library: &dyn NativeLibrary) -> Result<(), CallError> {
        let symbol = self.get_error.ok_or(CallError::ErrorCheckUnavailable)?;
        // Safety: glGetError takes nothing and returns a GLenum.
        match unsafe { library.invoke(symbol, &[], Primitive::UInt32) } {
            RawValue::UInt32(code) => error_for_code(code),
            other => Err(CallError::BadErrorCode(format!("{:?}", other))),
        }
    }
}

/// Per-call settings.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Check `glGetError` after the call.
    pub check_error: bool,
}

/// Binds commands against one library.
pub struct Binder {
    library: Rc<dyn NativeLibrary>,
    directives: Directives,
    errors: Rc<ErrorChecker>,
    check_errors: bool,
}

impl Binder {
    pub fn new(library: Rc<dyn NativeLibrary>, directives: Directives) -> Binder {
        let errors = Rc::new(ErrorChecker::new(&*library));
        Binder {
            library,
            directives,
            errors,
            check_errors: false,
        }
    }

    /// Make every command bound from now on check for errors after each call.
    pub fn check_errors(mut self, check_errors: bool) -> Binder {
        self.check_errors = check_errors;
        self
    }

    pub fn errors(&self) -> &ErrorChecker {
        &self.errors
    }

    pub fn bind(&self, command: &Command) -> BindOutcome {
        let Some(symbol) = self.library.lookup(&command.name) else {
            return BindOutcome::Skipped(SkipReason::NotAvailable(command.name.clone()));
        };
        let classification = match classify(command, &self.directives) {
            Ok(classification) => classification,
            Err(detail) => return BindOutcome::Skipped(SkipReason::NotSupported(detail)),
        };
        if let Err(detail) = self.library.check_signature(
            &classification.slot_types,
            classification.return_kind.primitive(),
        ) {
            return BindOutcome::Skipped(SkipReason::NotSupported(detail));
        }
        BindOutcome::Bound(BoundCommand {
            command: command.clone(),
            classification,
            symbol,
            library: self.library.clone(),
            errors: self.errors.clone(),
            check_errors: self.check_errors,
            calls: Cell::new(0),
        })
    }
}

/// Bind a single command. A [Binder] avoids repeating the setup for many.
pub fn bind_command(
    command: &Command,
    library: Rc<dyn NativeLibrary>,
    directives: &Directives,
) -> BindOutcome {
    Binder::new(library, directives.clone()).bind(command)
}

/// A command ready to be called.
pub struct BoundCommand {
    command: Command,
    classification: Classification,
    symbol: NativeSymbol,
    library: Rc<dyn NativeLibrary>,
    errors: Rc<ErrorChecker>,
    check_errors: bool,
    calls: Cell<u64>,
}

impl std::fmt::Debug for BoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoundCommand({})", self.signature())
    }
}

impl BoundCommand {
    pub fn name(&self) -> &str {
        &self.command.name
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn symbol(&self) -> NativeSymbol {
        self.symbol
    }

    /// Number of arguments [BoundCommand::call] takes.
    pub fn arity(&self) -> usize {
        self.classification.arity()
    }

    /// The high-level signature, e.g.
    /// `glGenBuffers(n: size of returned uint32_t)`.
    pub fn signature(&self) -> String {
        let arguments: Vec<String> = self
            .classification
            .marshallers
            .iter()
            .filter(|m| m.takes_argument())
            .map(Marshaller::describe)
            .collect();
        let mut returns: Vec<String> = Vec::new();
        match self.classification.return_kind {
            ReturnKind::Void => (),
            ReturnKind::Scalar(primitive) => returns.push(primitive.c_name().to_string()),
            ReturnKind::Text => returns.push("text".to_string()),
            ReturnKind::Pointer => returns.push("pointer".to_string()),
        }
        for marshaller in &self.classification.marshallers {
            match marshaller {
                Marshaller::OutputArray(array) => returns.push(array.array_name.clone()),
                Marshaller::ReferenceOutput { name, .. } => returns.push(name.clone()),
                _ => (),
            }
        }
        let mut signature = format!("{}({})", self.command.name, arguments.join(", "));
        match returns.len() {
            0 => (),
            1 => signature = format!("{} -> {}", signature, returns[0]),
            _ => signature = format!("{} -> ({})", signature, returns.join(", ")),
        }
        signature
    }

    /// Call the command, checking for errors afterwards if error checking was
    /// enabled when it was bound.
    pub fn call<'a, I>(&self, args: I) -> Result<Option<Value>, CallError>
    where
        I: IntoIterator<Item = Arg<'a>>,
    {
        self.call_with(
            args,
            CallOptions {
                check_error: self.check_errors,
            },
        )
    }

    /// Call the command and then check for errors.
    pub fn call_checked<'a, I>(&self, args: I) -> Result<Option<Value>, CallError>
    where
        I: IntoIterator<Item = Arg<'a>>,
    {
        self.call_with(args, CallOptions { check_error: true })
    }

    pub fn call_with<'a, I>(&self, args: I, options: CallOptions) -> Result<Option<Value>, CallError>
    where
        I: IntoIterator<Item = Arg<'a>>,
    {
        let mut args: Vec<Arg<'a>> = args.into_iter().collect();
        let frame = Frame::prepare(&self.classification, &mut args)?;
        self.calls.set(self.calls.get() + 1);

        let return_kind = self.classification.return_kind;
        // Safety: the argument list matches the registry's signature for the
        // command, and the frame keeps everything it points to alive.
        let value = unsafe {
            let ret = self
                .library
                .invoke(self.symbol, &frame.slots, return_kind.primitive());
            frame.finish(return_kind, ret)
        };

        if options.check_error {
            self.errors.check(&*self.library)?;
        }
        Ok(value)
    }

    /// Number of calls since binding or the last reset.
    pub fn call_count(&self) -> u64 {
        self.calls.get()
    }

    pub fn reset_call_count(&self) {
        self.calls.set(0)
    }
}
