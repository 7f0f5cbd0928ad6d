/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Type definitions (`<types>`) and the C type triple derived from them.

use crate::buffer::Primitive;
use std::collections::HashMap;

/// The C keyword a typedef ultimately names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CBase {
    Char,
    Short,
    Int,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    IntPtr,
    PtrDiff,
    SSize,
    Void,
}

impl CBase {
    fn from_keyword(keyword: &str) -> Option<CBase> {
        let keyword = keyword.strip_prefix("khronos_").unwrap_or(keyword);
        Some(match keyword {
            "char" => CBase::Char,
            "short" => CBase::Short,
            "int" => CBase::Int,
            "int8_t" => CBase::Int8,
            "uint8_t" => CBase::UInt8,
            "int16_t" => CBase::Int16,
            "uint16_t" => CBase::UInt16,
            "int32_t" => CBase::Int32,
            "uint32_t" => CBase::UInt32,
            "int64_t" => CBase::Int64,
            "uint64_t" => CBase::UInt64,
            "float" | "float_t" => CBase::Float,
            "double" => CBase::Double,
            "intptr_t" => CBase::IntPtr,
            "ptrdiff_t" => CBase::PtrDiff,
            "ssize_t" => CBase::SSize,
            "void" => CBase::Void,
            _ => return None,
        })
    }
}

/// `(base, unsigned, pointer)`: what a typedef means at the machine level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CType {
    pub base: CBase,
    pub unsigned: bool,
    pub pointer: bool,
}

impl CType {
    pub const VOID: CType = CType {
        base: CBase::Void,
        unsigned: false,
        pointer: false,
    };

    /// Derive the triple from the head of a declaration such as
    /// `typedef unsigned int`. Only single-line typedefs that don't open a
    /// function pointer declarator are understood.
    pub fn parse_declaration(head: &str) -> Option<CType> {
        let head = head.trim();
        if head.contains('\n') || head.ends_with('(') {
            return None;
        }
        let rest = head.strip_prefix("typedef")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        CType::parse_tokens(rest)
    }

    /// Derive the triple from a bare C type such as `unsigned int`.
    pub fn parse_tokens(text: &str) -> Option<CType> {
        let mut base = None;
        let mut unsigned = false;
        let mut pointer = false;
        // "int*" and "int *" are the same thing
        for token in text.replace('*', " * ").split_whitespace() {
            match token {
                "unsigned" => unsigned = true,
                "signed" => unsigned = false,
                "*" => pointer = true,
                // Opaque struct typedefs like GLsync have no base keyword.
                "struct" => return None,
                _ => {
                    if let Some(keyword) = CBase::from_keyword(token) {
                        base = Some(keyword);
                    }
                }
            }
        }
        base.map(|base| CType {
            base,
            unsigned,
            pointer,
        })
    }

    /// Map the triple onto the fixed primitive set. `char` counts as signed,
    /// and the pointer-sized integer types are treated as pointers except for
    /// `ssize_t`.
    pub fn primitive(&self) -> Primitive {
        if self.pointer {
            return Primitive::Pointer;
        }
        let u = self.unsigned;
        match self.base {
            CBase::Char | CBase::Int8 | CBase::UInt8 => {
                if u || self.base == CBase::UInt8 {
                    Primitive::UInt8
                } else {
                    Primitive::Int8
                }
            }
            CBase::Short | CBase::Int16 | CBase::UInt16 => {
                if u || self.base == CBase::UInt16 {
                    Primitive::UInt16
                } else {
                    Primitive::Int16
                }
            }
            CBase::Int | CBase::Int32 | CBase::UInt32 => {
                if u || self.base == CBase::UInt32 {
                    Primitive::UInt32
                } else {
                    Primitive::Int32
                }
            }
            CBase::Int64 | CBase::UInt64 | CBase::SSize => {
                if u || self.base == CBase::UInt64 {
                    Primitive::UInt64
                } else {
                    Primitive::Int64
                }
            }
            CBase::Float => Primitive::Float,
            CBase::Double => Primitive::Double,
            CBase::IntPtr | CBase::PtrDiff => Primitive::Pointer,
            CBase::Void => Primitive::Void,
        }
    }

    /// `char` (not `unsigned char`): the pointee that carries text.
    pub fn is_text(&self) -> bool {
        self.base == CBase::Char && !self.unsigned && !self.pointer
    }

    /// Any single-byte integer, e.g. `GLubyte` or `GLchar`.
    pub fn is_byte(&self) -> bool {
        matches!(self.primitive(), Primitive::Int8 | Primitive::UInt8)
    }
}

/// A `<type>` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub name: String,
    pub api: Option<String>,
    pub requires: Option<String>,
    pub comment: Option<String>,
    /// Declaration text before the name, e.g. `typedef unsigned int`.
    pub declaration_head: String,
    /// Declaration text after the name, usually `;`.
    pub declaration_tail: String,
    pub apientry: bool,
    pub ctype: Option<CType>,
}

impl Type {
    pub fn is_opaque(&self) -> bool {
        self.ctype.is_none()
    }

    pub fn declaration(&self) -> String {
        format!(
            "{}{}{}",
            self.declaration_head, self.name, self.declaration_tail
        )
    }
}

/// All types in document order, indexed per API scope.
#[derive(Debug, Default)]
pub struct Types {
    types: Vec<Type>,
    scoped: HashMap<(String, Option<String>), usize>,
}

impl Types {
    /// Add a type. Resolved types may only be defined once per API scope;
    /// on conflict the name and scope are returned. Opaque placeholders are
    /// always accepted but only the first one is indexed.
    pub(super) fn insert(&mut self, type_: Type) -> Result<(), (String, Option<String>)> {
        let key = (type_.name.clone(), type_.api.clone());
        match self.scoped.get(&key).copied() {
            Some(existing) if !self.types[existing].is_opaque() => {
                if !type_.is_opaque() {
                    return Err(key);
                }
            }
            Some(_) if !type_.is_opaque() => {
                // a real definition replaces a placeholder in the index
                self.scoped.insert(key, self.types.len());
            }
            Some(_) => (),
            None => {
                self.scoped.insert(key, self.types.len());
            }
        }
        self.types.push(type_);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Look up a type by name, preferring the unqualified definition over an
    /// API-specific one.
    pub fn get(&self, name: &str) -> Option<&Type> {
        if let Some(&i) = self.scoped.get(&(name.to_string(), None)) {
            return Some(&self.types[i]);
        }
        self.types
            .iter()
            .find(|type_| type_.name == name && !type_.is_opaque())
            .or_else(|| self.types.iter().find(|type_| type_.name == name))
    }

    pub fn get_for_api(&self, name: &str, api: &str) -> Option<&Type> {
        self.scoped
            .get(&(name.to_string(), Some(api.to_string())))
            .map(|&i| &self.types[i])
            .or_else(|| self.get(name))
    }

    /// The C triple for a parameter's type name: a registered type, or else a
    /// bare C type like `void` or `unsigned int`.
    pub fn resolve_ctype(&self, name: &str) -> Option<CType> {
        match self.get(name) {
            Some(type_) => type_.ctype,
            None => CType::parse_tokens(name),
        }
    }
}
