/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Features (API versions) and extensions, and the interface blocks they are
//! made of.

use super::ApiNumber;
use regex::Regex;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Type,
    Enum,
    Command,
}

impl ItemKind {
    pub fn from_tag(tag: &str) -> Option<ItemKind> {
        match tag {
            "type" => Some(ItemKind::Type),
            "enum" => Some(ItemKind::Enum),
            "command" => Some(ItemKind::Command),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Type => "type",
            ItemKind::Enum => "enum",
            ItemKind::Command => "command",
        }
    }
}

/// A type, enumerant or command named by an interface block. Two items are the
/// same item if their names are equal.
#[derive(Debug, Clone)]
pub struct InterfaceItem {
    pub kind: ItemKind,
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InterfaceKind {
    Require,
    Remove,
}

/// A `<require>` or `<remove>` block.
#[derive(Debug, Clone)]
pub struct Interface {
    pub kind: InterfaceKind,
    pub profile: Option<String>,
    pub api: Option<String>,
    pub comment: Option<String>,
    pub items: Vec<InterfaceItem>,
}

impl Interface {
    /// Whether this block applies to a request. An unset profile on either
    /// side matches everything.
    pub fn applies_to(&self, api: &str, profile: Option<&str>) -> bool {
        let profile_matches = match (profile, self.profile.as_deref()) {
            (Some(requested), Some(own)) => requested == own,
            _ => true,
        };
        let api_matches = self.api.as_deref().map_or(true, |own| own == api);
        profile_matches && api_matches
    }
}

/// A `<feature>`: everything that makes up one version of one API.
#[derive(Debug, Clone)]
pub struct Feature {
    pub api: String,
    pub name: String,
    pub version: ApiNumber,
    pub protect: Option<String>,
    pub comment: Option<String>,
    pub interfaces: Vec<Interface>,
}

/// An `<extension>`.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    /// The raw `supported` attribute, e.g. `gl|glcore`.
    pub supported: String,
    pub protect: Option<String>,
    pub comment: Option<String>,
    pub interfaces: Vec<Interface>,
    pattern: Regex,
}

impl Extension {
    pub(super) fn new(
        name: String,
        supported: String,
        protect: Option<String>,
        comment: Option<String>,
        interfaces: Vec<Interface>,
    ) -> Result<Extension, regex::Error> {
        let pattern = Regex::new(&format!("^(?:{})$", supported))?;
        Ok(Extension {
            name,
            supported,
            protect,
            comment,
            interfaces,
            pattern,
        })
    }

    /// Whether the extension can be used with an API, according to its
    /// `supported` pattern.
    pub fn supports(&self, api: &str) -> bool {
        self.pattern.is_match(api)
    }
}
