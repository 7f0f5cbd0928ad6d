/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! The Khronos XML API registry (`gl.xml` and friends).
//!
//! A [Registry] is a faithful, immutable model of one registry document: type
//! definitions, enumerants, command prototypes, and the features and
//! extensions that say which of those make up a particular API version. It
//! doesn't know anything about what a caller wants, that's the job of
//! [crate::resolver].
//!
//! Useful resources:
//! * [The Khronos OpenGL registry](https://github.com/KhronosGroup/OpenGL-Registry), in particular `xml/readme.pdf` which documents the schema.

mod api_number;
mod commands;
mod enums;
mod features;
mod parser;
pub mod schema;
mod types;
pub mod xml;

pub use api_number::ApiNumber;
pub use commands::{Command, Length, Parameter};
pub use enums::{parse_integer, Enum, EnumSuffix, EnumsBlock, Group};
pub use features::{Extension, Feature, Interface, InterfaceItem, InterfaceKind, ItemKind};
pub use types::{CBase, CType, Type, Types};

use crate::error::RegistryError;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default)]
pub struct Registry {
    types: Types,
    groups: Vec<Group>,
    enum_blocks: Vec<EnumsBlock>,
    commands: Vec<Command>,
    command_index: HashMap<String, usize>,
    features: Vec<Feature>,
    extensions: Vec<Extension>,
}

impl Registry {
    /// Parse a registry document held in memory.
    pub fn parse(text: &str) -> Result<Registry, RegistryError> {
        let root = xml::parse_document(text)?;
        parser::parse_registry(&root)
    }

    /// Like [Registry::parse], but check the document's structure first. Every
    /// problem found is logged, and then the document is parsed anyway.
    pub fn parse_validated(text: &str) -> Result<Registry, RegistryError> {
        let root = xml::parse_document(text)?;
        let violations = schema::validate(&root);
        for violation in &violations {
            log!("Schema violation: {}", violation);
        }
        if violations.is_empty() {
            log_dbg!("Registry document is structurally valid");
        }
        parser::parse_registry(&root)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Registry, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        Registry::parse(&text)
    }

    /// The OpenGL registry that ships with the `khronos_api` crate.
    pub fn bundled_gl() -> Result<Registry, RegistryError> {
        Registry::parse(&String::from_utf8_lossy(khronos_api::GL_XML))
    }

    fn add_command(&mut self, command: Command) -> Result<(), RegistryError> {
        if self.command_index.contains_key(&command.name) {
            return Err(RegistryError::DuplicateCommand(command.name));
        }
        self.command_index
            .insert(command.name.clone(), self.commands.len());
        self.commands.push(command);
        Ok(())
    }

    pub fn types(&self) -> &Types {
        &self.types
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn enum_blocks(&self) -> &[EnumsBlock] {
        &self.enum_blocks
    }

    /// Commands in document order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.command_index.get(name).map(|&i| &self.commands[i])
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }

    /// Extensions whose `supported` pattern accepts `api`.
    pub fn extensions_for<'a>(&'a self, api: &'a str) -> impl Iterator<Item = &'a Extension> {
        self.extensions.iter().filter(move |e| e.supports(api))
    }

    /// Distinct API names used by features, in document order.
    pub fn apis(&self) -> Vec<&str> {
        let mut apis: Vec<&str> = Vec::new();
        for feature in &self.features {
            if !apis.contains(&feature.api.as_str()) {
                apis.push(&feature.api);
            }
        }
        apis
    }
}
