/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Commands (`<commands>`): prototypes, parameters and array lengths.

use super::types::CType;

/// How long the array behind a pointer parameter is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Length {
    /// Not an array, or the length is unknown.
    None,
    /// A constant number of elements, e.g. `len="4"`.
    Fixed(u32),
    /// The value of another parameter of the same command, times a constant
    /// (`len="count*2"`).
    Parameter { name: String, multiplier: u32 },
    /// An expression the caller has to work out, e.g.
    /// `len="COMPSIZE(format,type)"`.
    Computed(String),
}

impl Length {
    /// Interpret a `len` attribute. Whether a parameter name actually names a
    /// sibling parameter is checked later, when the whole command is known.
    pub fn parse(text: Option<&str>) -> Length {
        let Some(text) = text.map(str::trim) else {
            return Length::None;
        };
        if let Ok(n) = text.parse() {
            Length::Fixed(n)
        } else if text.starts_with("COMPSIZE") {
            Length::Computed(text.to_string())
        } else if let Some((name, multiplier)) = text.split_once('*') {
            match multiplier.trim().parse() {
                Ok(multiplier) => Length::Parameter {
                    name: name.trim().to_string(),
                    multiplier,
                },
                Err(_) => Length::Computed(text.to_string()),
            }
        } else {
            Length::Parameter {
                name: text.to_string(),
                multiplier: 1,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Position in the argument list. The return descriptor has none.
    pub location: Option<usize>,
    pub name: Option<String>,
    /// The `ptype`, or the bare C type text such as `void`.
    pub type_name: String,
    pub ctype: Option<CType>,
    pub group: Option<String>,
    pub is_const: bool,
    pub pointer: u8,
    pub length: Length,
    /// Locations of the array parameters whose length is this parameter.
    pub dependents: Vec<usize>,
}

impl Parameter {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("return value")
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer > 0
    }

    /// The parameter as it appears in a C prototype.
    pub fn c_declaration(&self) -> String {
        let mut text = String::new();
        if self.is_const {
            text.push_str("const ");
        }
        text.push_str(&self.type_name);
        match self.pointer {
            0 => (),
            1 => text.push_str(" *"),
            _ => text.push_str(if self.is_const { " *const*" } else { " **" }),
        }
        if let Some(name) = &self.name {
            if self.pointer == 0 {
                text.push(' ');
            }
            text.push_str(name);
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub return_type: Parameter,
    pub parameters: Vec<Parameter>,
    pub alias: Option<String>,
}

impl Command {
    /// Number of parameters the command reads through a pointer.
    pub fn input_parameter_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.is_pointer() && p.is_const)
            .count()
    }

    /// Number of parameters the command may write through a pointer.
    pub fn output_parameter_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.is_pointer() && !p.is_const)
            .count()
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
    }

    /// The C prototype, e.g. `void glGenBuffers(GLsizei n, GLuint *buffers);`
    pub fn prototype(&self) -> String {
        let parameters: Vec<String> = self.parameters.iter().map(|p| p.c_declaration()).collect();
        let mut return_type = self.return_type.c_declaration();
        if self.return_type.pointer == 0 {
            return_type.push(' ');
        }
        format!(
            "{}{}({});",
            return_type,
            self.name,
            if parameters.is_empty() {
                "void".to_string()
            } else {
                parameters.join(", ")
            }
        )
    }

    /// Second pass over a freshly parsed command: point every size parameter
    /// at the arrays that depend on it. A length naming something that isn't a
    /// sibling parameter can't be wired, so it becomes a computed length.
    pub(super) fn link_lengths(&mut self) {
        for i in 0..self.parameters.len() {
            let Length::Parameter { name, .. } = &self.parameters[i].length else {
                continue;
            };
            let size_parameter = self
                .parameters
                .iter()
                .position(|p| p.name.as_ref() == Some(name) && p.location != Some(i));
            match size_parameter {
                Some(size_parameter) => self.parameters[size_parameter].dependents.push(i),
                None => {
                    log_dbg!(
                        "{}: length {:?} of {} does not name a parameter",
                        self.name,
                        name,
                        self.parameters[i].display_name()
                    );
                    let expression = name.clone();
                    self.parameters[i].length = Length::Computed(expression);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths() {
        assert_eq!(Length::parse(None), Length::None);
        assert_eq!(Length::parse(Some("1")), Length::Fixed(1));
        assert_eq!(Length::parse(Some("16")), Length::Fixed(16));
        assert_eq!(
            Length::parse(Some("COMPSIZE(format,type)")),
            Length::Computed("COMPSIZE(format,type)".to_string())
        );
        assert_eq!(
            Length::parse(Some("count*4")),
            Length::Parameter {
                name: "count".to_string(),
                multiplier: 4
            }
        );
        assert_eq!(
            Length::parse(Some("n")),
            Length::Parameter {
                name: "n".to_string(),
                multiplier: 1
            }
        );
        assert_eq!(
            Length::parse(Some("count*stride")),
            Length::Computed("count*stride".to_string())
        );
    }

    fn parameter(location: usize, name: &str, pointer: u8, length: Length) -> Parameter {
        Parameter {
            location: Some(location),
            name: Some(name.to_string()),
            type_name: "GLuint".to_string(),
            ctype: None,
            group: None,
            is_const: false,
            pointer,
            length,
            dependents: Vec::new(),
        }
    }

    #[test]
    fn linking() {
        let mut command = Command {
            name: "glTest".to_string(),
            return_type: Parameter {
                location: None,
                name: None,
                type_name: "void".to_string(),
                ctype: Some(CType::VOID),
                group: None,
                is_const: false,
                pointer: 0,
                length: Length::None,
                dependents: Vec::new(),
            },
            parameters: vec![
                parameter(0, "n", 0, Length::None),
                parameter(
                    1,
                    "ids",
                    1,
                    Length::Parameter {
                        name: "n".to_string(),
                        multiplier: 1,
                    },
                ),
                parameter(
                    2,
                    "other",
                    1,
                    Length::Parameter {
                        name: "bufSize/4".to_string(),
                        multiplier: 1,
                    },
                ),
            ],
            alias: None,
        };
        command.link_lengths();
        assert_eq!(command.parameters[0].dependents, vec![1]);
        assert_eq!(
            command.parameters[2].length,
            Length::Computed("bufSize/4".to_string())
        );
        assert_eq!(command.output_parameter_count(), 2);
        assert_eq!(command.input_parameter_count(), 0);
        assert_eq!(
            command.prototype(),
            "void glTest(GLuint n, GLuint *ids, GLuint *other);"
        );
    }
}
