/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Deciding how each parameter of a command is passed.
//!
//! The registry says a lot about the parameters of a command besides their C
//! type: whether a pointer is read or written (`const`), and how long the array
//! behind it is (`len`). That's enough to give most commands a convenient
//! high-level signature. For example, `glGenBuffers(GLsizei n, GLuint
//! *buffers)` can take just `n` and return the new buffer names, because
//! `buffers` is a non-const array whose length is `n`.
//!
//! Every parameter gets exactly one [Marshaller], in this order of precedence:
//! 1. a directive says to always pass null/zero ([Marshaller::Null]);
//! 2. a non-const pointer to a single element, or one a directive says is
//!    written like one, is a value returned by reference
//!    ([Marshaller::ReferenceOutput]);
//! 3. a pointer whose length isn't given by another parameter is passed as-is
//!    ([Marshaller::OpaquePointer]);
//! 4. a pointer whose length is another parameter gets no marshaller of its
//!    own, it's handled by the size parameter's;
//! 5. a size parameter becomes an [Marshaller::InputArray] or
//!    [Marshaller::OutputArray], depending on whether the array is const;
//! 6. everything else is a [Marshaller::PlainValue].

use crate::buffer::Primitive;
use crate::registry::{CType, Command, Length, Parameter};
use std::collections::HashMap;

/// What a pointer points at, as far as marshalling is concerned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pointee {
    /// `void`: any buffer will do, and sizes are in bytes.
    Untyped,
    /// `GLchar`: text.
    Text,
    Typed(Primitive),
}

impl Pointee {
    fn of(ctype: &CType) -> Pointee {
        if ctype.is_text() {
            Pointee::Text
        } else {
            match ctype.primitive() {
                Primitive::Void => Pointee::Untyped,
                other => Pointee::Typed(other),
            }
        }
    }

    /// Element type of a buffer allocated for this pointee.
    pub fn element_type(self) -> Option<Primitive> {
        match self {
            Pointee::Untyped => None,
            Pointee::Text => Some(Primitive::UInt8),
            Pointee::Typed(primitive) => Some(primitive),
        }
    }

    fn describe(self) -> String {
        match self {
            Pointee::Untyped => "bytes".to_string(),
            Pointee::Text => "text".to_string(),
            Pointee::Typed(primitive) => primitive.c_name().to_string(),
        }
    }
}

/// A size parameter and the array whose length it gives.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayBinding {
    pub size_location: usize,
    pub size_name: String,
    pub size_primitive: Primitive,
    pub array_location: usize,
    pub array_name: String,
    pub pointee: Pointee,
    /// 1 for an array of elements, 2 for an array of strings.
    pub pointer: u8,
    pub multiplier: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Marshaller {
    /// Always null or zero, and not part of the high-level signature.
    Null { location: usize, primitive: Primitive },
    PlainValue {
        location: usize,
        name: String,
        primitive: Primitive,
    },
    /// Storage is allocated for each call, and the first value it holds
    /// afterwards is returned.
    ReferenceOutput {
        location: usize,
        name: String,
        primitive: Primitive,
        /// Elements allocated. More than one when the native side may write
        /// extra values for some arguments.
        capacity: usize,
    },
    /// A pointer the caller provides, e.g. a buffer whose size depends on
    /// other arguments in ways the registry can't express.
    OpaquePointer {
        location: usize,
        name: String,
        pointee: Pointee,
        is_const: bool,
    },
    InputArray(ArrayBinding),
    OutputArray(ArrayBinding),
}

impl Marshaller {
    /// Whether the caller supplies an argument for this marshaller.
    pub fn takes_argument(&self) -> bool {
        !matches!(
            self,
            Marshaller::Null { .. } | Marshaller::ReferenceOutput { .. }
        )
    }

    /// Short description for the high-level signature.
    pub fn describe(&self) -> String {
        match self {
            Marshaller::Null { .. } => "null".to_string(),
            Marshaller::PlainValue {
                name, primitive, ..
            } => format!("{}: {}", name, primitive.c_name()),
            Marshaller::ReferenceOutput {
                name, primitive, ..
            } => format!("{}: returned {}", name, primitive.c_name()),
            Marshaller::OpaquePointer {
                name,
                pointee,
                is_const,
                ..
            } => format!(
                "{}: {}pointer to {}",
                name,
                if *is_const { "const " } else { "" },
                pointee.describe()
            ),
            Marshaller::InputArray(array) => format!(
                "{}: {} (sets {})",
                array.array_name,
                if array.pointer == 2 {
                    "list of strings".to_string()
                } else {
                    format!("array of {}", array.pointee.describe())
                },
                array.size_name
            ),
            Marshaller::OutputArray(array) => format!(
                "{}: size of returned {}",
                array.size_name,
                array.pointee.describe()
            ),
        }
    }
}

/// How the return value of a command is converted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    Scalar(Primitive),
    /// A pointer to a C string, e.g. from `glGetString`.
    Text,
    /// An untyped pointer, e.g. from `glMapBuffer`.
    Pointer,
}

impl ReturnKind {
    /// The native return type.
    pub fn primitive(self) -> Primitive {
        match self {
            ReturnKind::Void => Primitive::Void,
            ReturnKind::Scalar(primitive) => primitive,
            ReturnKind::Text | ReturnKind::Pointer => Primitive::Pointer,
        }
    }
}

/// The marshalling plan for one command.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// In parameter order. Array marshallers sit at the size parameter's
    /// position, and array parameters have none.
    pub marshallers: Vec<Marshaller>,
    /// Native type of each parameter.
    pub slot_types: Vec<Primitive>,
    pub return_kind: ReturnKind,
}

impl Classification {
    /// Number of arguments in the high-level signature.
    pub fn arity(&self) -> usize {
        self.marshallers.iter().filter(|m| m.takes_argument()).count()
    }
}

/// Per-command overrides of classification: parameters that are always
/// passed as null, and output pointers whose length the registry only gives
/// as `COMPSIZE(...)` but which are returned by reference.
#[derive(Debug, Clone)]
pub struct Directives {
    null_parameters: HashMap<String, Vec<String>>,
    reference_outputs: HashMap<String, HashMap<String, usize>>,
}

impl Default for Directives {
    /// `glShaderSource` can take an array of string lengths, but the strings
    /// are passed NUL-terminated anyway.
    ///
    /// `glGetShaderiv` and `glGetProgramiv` write one value for almost every
    /// `pname`. `GL_COMPUTE_WORK_GROUP_SIZE` writes three, so there is room
    /// for that, but only the first is returned.
    fn default() -> Directives {
        Directives::empty()
            .with_null_parameter("glShaderSource", "length")
            .with_reference_output("glGetShaderiv", "params", 1)
            .with_reference_output("glGetProgramiv", "params", 3)
    }
}

impl Directives {
    pub fn empty() -> Directives {
        Directives {
            null_parameters: HashMap::new(),
            reference_outputs: HashMap::new(),
        }
    }

    /// Return `parameter` of `command` by reference, with room for
    /// `capacity` elements.
    pub fn with_reference_output(
        mut self,
        command: &str,
        parameter: &str,
        capacity: usize,
    ) -> Directives {
        self.reference_outputs
            .entry(command.to_string())
            .or_default()
            .insert(parameter.to_string(), capacity.max(1));
        self
    }

    pub fn reference_capacity(&self, command: &str, parameter: &str) -> Option<usize> {
        self.reference_outputs.get(command)?.get(parameter).copied()
    }

    pub fn with_null_parameter(mut self, command: &str, parameter: &str) -> Directives {
        self.null_parameters
            .entry(command.to_string())
            .or_default()
            .push(parameter.to_string());
        self
    }

    pub fn is_null_parameter(&self, command: &str, parameter: &str) -> bool {
        self.null_parameters
            .get(command)
            .map_or(false, |parameters| parameters.iter().any(|p| p == parameter))
    }
}

fn resolved_ctype(parameter: &Parameter) -> Result<CType, String> {
    parameter.ctype.ok_or_else(|| {
        format!(
            "{} has type {}, which has no known representation",
            parameter.display_name(),
            parameter.type_name
        )
    })
}

fn slot_type(parameter: &Parameter) -> Result<Primitive, String> {
    if parameter.is_pointer() {
        return Ok(Primitive::Pointer);
    }
    match resolved_ctype(parameter)?.primitive() {
        Primitive::Void => Err(format!("{} has type void", parameter.display_name())),
        primitive => Ok(primitive),
    }
}

fn return_kind(command: &Command) -> Result<ReturnKind, String> {
    let ret = &command.return_type;
    let ctype = resolved_ctype(ret)?;
    match ret.pointer {
        0 => Ok(match ctype.primitive() {
            Primitive::Void => ReturnKind::Void,
            primitive => ReturnKind::Scalar(primitive),
        }),
        1 if ctype.is_byte() => Ok(ReturnKind::Text),
        1 if ctype.primitive() == Primitive::Void => Ok(ReturnKind::Pointer),
        _ => Err(format!(
            "returning {} is not supported",
            ret.c_declaration()
        )),
    }
}

fn is_null_parameter(command: &Command, directives: &Directives, parameter: &Parameter) -> bool {
    parameter
        .name
        .as_deref()
        .map_or(false, |name| directives.is_null_parameter(&command.name, name))
}

/// Whether the length of an array parameter is given by a size parameter
/// that can actually provide it: a plain integer that isn't overridden.
fn has_size_parameter(command: &Command, directives: &Directives, parameter: &Parameter) -> bool {
    let Length::Parameter { name, .. } = &parameter.length else {
        return false;
    };
    command.parameter(name).map_or(false, |size| {
        !size.is_pointer() && !is_null_parameter(command, directives, size)
    })
}

/// Classify every parameter and the return value of a command. The result
/// depends only on the command and the directives. An error describes why
/// the command can't be bound.
pub fn classify(command: &Command, directives: &Directives) -> Result<Classification, String> {
    let parameters = &command.parameters;
    let is_null = |parameter: &Parameter| is_null_parameter(command, directives, parameter);
    let has_size = |parameter: &Parameter| has_size_parameter(command, directives, parameter);

    let mut slot_types = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        slot_types.push(if is_null(parameter) && parameter.is_pointer() {
            Primitive::Pointer
        } else {
            slot_type(parameter)?
        });
    }

    let mut marshallers = Vec::new();
    for (location, parameter) in parameters.iter().enumerate() {
        let name = parameter.display_name().to_string();

        if is_null(parameter) {
            marshallers.push(Marshaller::Null {
                location,
                primitive: slot_types[location],
            });
            continue;
        }

        if parameter.is_pointer() {
            let ctype = resolved_ctype(parameter)?;
            if has_size(parameter) {
                // handled by the size parameter
                continue;
            }
            let forced = parameter
                .name
                .as_deref()
                .and_then(|name| directives.reference_capacity(&command.name, name));
            if forced.is_some() && parameter.is_const {
                return Err(format!("{} is const and can't be returned", name));
            }
            if !parameter.is_const && (parameter.length == Length::Fixed(1) || forced.is_some()) {
                let primitive = if parameter.pointer == 2 {
                    Primitive::Pointer
                } else {
                    ctype.primitive()
                };
                if primitive == Primitive::Void {
                    return Err(format!("{} is an untyped reference", name));
                }
                marshallers.push(Marshaller::ReferenceOutput {
                    location,
                    name,
                    primitive,
                    capacity: forced.unwrap_or(1),
                });
            } else {
                marshallers.push(Marshaller::OpaquePointer {
                    location,
                    name,
                    pointee: if parameter.pointer == 2 {
                        Pointee::Typed(Primitive::Pointer)
                    } else {
                        Pointee::of(&ctype)
                    },
                    is_const: parameter.is_const,
                });
            }
            continue;
        }

        let arrays: Vec<&Parameter> = parameter
            .dependents
            .iter()
            .map(|&i| &parameters[i])
            .filter(|array| !is_null(*array) && has_size(*array))
            .collect();
        let Some(&array) = arrays.first() else {
            marshallers.push(Marshaller::PlainValue {
                location,
                name,
                primitive: slot_types[location],
            });
            continue;
        };

        // Only one array can be wired to a size parameter.
        if arrays.len() > 1 {
            return Err(format!(
                "{} gives the size of {} arrays",
                name,
                arrays.len()
            ));
        }
        if !slot_types[location].is_integer() {
            return Err(format!("size parameter {} is not an integer", name));
        }

        let ctype = resolved_ctype(array)?;
        let pointee = Pointee::of(&ctype);
        if array.pointer == 2 && (pointee != Pointee::Text || !array.is_const) {
            return Err(format!(
                "{} is an array of pointers",
                array.display_name()
            ));
        }
        let multiplier = match &array.length {
            Length::Parameter { multiplier, .. } => *multiplier,
            _ => 1,
        };
        let binding = ArrayBinding {
            size_location: location,
            size_name: name,
            size_primitive: slot_types[location],
            array_location: array.location.unwrap_or_default(),
            array_name: array.display_name().to_string(),
            pointee,
            pointer: array.pointer,
            multiplier,
        };
        marshallers.push(if array.is_const {
            Marshaller::InputArray(binding)
        } else {
            Marshaller::OutputArray(binding)
        });
    }

    Ok(Classification {
        marshallers,
        slot_types,
        return_kind: return_kind(command)?,
    })
}
