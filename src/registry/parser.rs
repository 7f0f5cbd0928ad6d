/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Turning the element tree of a registry document into a [Registry].

use super::xml::Element;
use super::{
    parse_integer, ApiNumber, CType, Command, Enum, EnumSuffix, EnumsBlock, Extension, Feature,
    Group, Interface, InterfaceItem, InterfaceKind, ItemKind, Length, Parameter, Registry, Type,
    Types,
};
use crate::error::RegistryError;

fn required_attribute(element: &Element, attribute: &'static str) -> Result<String, RegistryError> {
    element
        .owned_attribute(attribute)
        .ok_or_else(|| RegistryError::MissingAttribute {
            tag: element.tag.clone(),
            attribute,
        })
}

fn integer_attribute(element: &Element, attribute: &str) -> Result<Option<u64>, RegistryError> {
    element
        .attribute(attribute)
        .map(|text| parse_integer(text).ok_or_else(|| RegistryError::BadInteger(text.to_string())))
        .transpose()
}

pub(super) fn parse_registry(root: &Element) -> Result<Registry, RegistryError> {
    if root.tag != "registry" {
        return Err(RegistryError::BadRoot(root.tag.clone()));
    }

    let mut registry = Registry::default();
    for section in root.elements() {
        match section.tag.as_str() {
            "types" => {
                for element in section.elements().filter(|e| e.tag == "type") {
                    let type_ = parse_type(element)?;
                    registry
                        .types
                        .insert(type_)
                        .map_err(|(name, api)| RegistryError::DuplicateType { name, api })?;
                }
            }
            "groups" => {
                for element in section.elements().filter(|e| e.tag == "group") {
                    registry.groups.push(parse_group(element)?);
                }
            }
            "enums" => registry.enum_blocks.push(parse_enums(section)?),
            "commands" => {
                for element in section.elements().filter(|e| e.tag == "command") {
                    let command = parse_command(element, &registry.types)?;
                    registry.add_command(command)?;
                }
            }
            "feature" => registry.features.push(parse_feature(section)?),
            "extensions" => {
                for element in section.elements().filter(|e| e.tag == "extension") {
                    registry.extensions.push(parse_extension(element)?);
                }
            }
            _ => (),
        }
    }

    log_dbg!(
        "Parsed {} types, {} enumerant blocks, {} commands, {} features and {} extensions",
        registry.types.len(),
        registry.enum_blocks.len(),
        registry.commands.len(),
        registry.features.len(),
        registry.extensions.len()
    );

    Ok(registry)
}

fn parse_type(element: &Element) -> Result<Type, RegistryError> {
    let mut name = element.owned_attribute("name");
    let mut apientry = false;
    let mut declaration_tail = String::new();
    for (child, tail) in element.elements_with_tails() {
        match child.tag.as_str() {
            "name" => {
                name = Some(child.text());
                declaration_tail = tail.unwrap_or("").to_string();
            }
            "apientry" => apientry = true,
            _ => (),
        }
    }
    let name = name.ok_or_else(|| RegistryError::MissingName("type".to_string()))?;
    let declaration_head = element.leading_text().unwrap_or("").to_string();

    let ctype = CType::parse_declaration(&declaration_head);
    if ctype.is_none() {
        if declaration_head.trim_start().starts_with("typedef") {
            log!("Type {} is not understood, treating it as opaque", name);
        } else {
            log_dbg!("Type {} is not a typedef, treating it as opaque", name);
        }
    }

    Ok(Type {
        name,
        api: element.owned_attribute("api"),
        requires: element.owned_attribute("requires"),
        comment: element.owned_attribute("comment"),
        declaration_head,
        declaration_tail,
        apientry,
        ctype,
    })
}

fn parse_group(element: &Element) -> Result<Group, RegistryError> {
    Ok(Group {
        name: required_attribute(element, "name")?,
        comment: element.owned_attribute("comment"),
        enums: element
            .elements()
            .filter(|e| e.tag == "enum")
            .map(|e| required_attribute(e, "name"))
            .collect::<Result<_, _>>()?,
    })
}

fn parse_enums(element: &Element) -> Result<EnumsBlock, RegistryError> {
    let mut block = EnumsBlock::default();
    block.namespace = element.owned_attribute("namespace");
    block.group = element.owned_attribute("group");
    block.type_ = element.owned_attribute("type");
    block.start = integer_attribute(element, "start")?;
    block.end = integer_attribute(element, "end")?;
    block.vendor = element.owned_attribute("vendor");
    block.comment = element.owned_attribute("comment");

    // <unused> ranges are of no interest.
    for child in element.elements().filter(|e| e.tag == "enum") {
        let value_text = required_attribute(child, "value")?;
        let enum_ = Enum {
            name: required_attribute(child, "name")?,
            value: parse_integer(&value_text).ok_or(RegistryError::BadInteger(value_text))?,
            suffix: child.attribute("type").and_then(EnumSuffix::parse),
            api: child.owned_attribute("api"),
            alias: child.owned_attribute("alias"),
            comment: child.owned_attribute("comment"),
        };
        block
            .insert(enum_)
            .map_err(|e| RegistryError::DuplicateEnum {
                name: e.name,
                api: e.api,
            })?;
    }
    Ok(block)
}

/// Split C decorations off a piece of declaration text: a leading `const` and
/// a trailing `*`, `**` or `*const*`. Returns `(const, pointer depth, rest)`.
fn split_decorations(text: &str) -> (bool, u8, &str) {
    let mut text = text.trim();
    let mut is_const = false;
    if let Some(rest) = text.strip_prefix("const") {
        if rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '*') {
            is_const = true;
            text = rest;
        }
    }
    let text = text.trim_end();
    let (pointer, text) = if let Some(rest) = text.strip_suffix("*const*") {
        (2, rest)
    } else if let Some(rest) = text.strip_suffix("**") {
        (2, rest)
    } else if let Some(rest) = text.strip_suffix('*') {
        (1, rest)
    } else {
        (0, text)
    };
    (is_const, pointer, text.trim())
}

/// Parse a `<param>`, or the `<proto>` (which has no location).
fn parse_parameter(
    element: &Element,
    location: Option<usize>,
    types: &Types,
) -> Result<Parameter, RegistryError> {
    let mut is_const = false;
    let mut pointer = 0;
    let mut decorate = |text: &str| {
        let (c, p, rest) = split_decorations(text);
        is_const |= c;
        pointer = pointer.max(p);
        rest.to_string()
    };

    let bare_type = element.leading_text().map(&mut decorate);
    let mut type_name = None;
    let mut name = None;
    for (child, tail) in element.elements_with_tails() {
        match child.tag.as_str() {
            "ptype" => type_name = Some(child.text().trim().to_string()),
            "name" => name = Some(child.text().trim().to_string()),
            _ => (),
        }
        if let Some(tail) = tail {
            decorate(tail);
        }
    }

    let type_name = type_name.or(bare_type).unwrap_or_default();
    let ctype = types.resolve_ctype(&type_name);

    Ok(Parameter {
        location,
        name,
        ctype,
        type_name,
        group: element.owned_attribute("group"),
        is_const,
        pointer,
        length: Length::parse(element.attribute("len")),
        dependents: Vec::new(),
    })
}

fn parse_command(element: &Element, types: &Types) -> Result<Command, RegistryError> {
    let mut proto = None;
    let mut parameters = Vec::new();
    let mut alias = None;
    for child in element.elements() {
        match child.tag.as_str() {
            "proto" => proto = Some(parse_parameter(child, None, types)?),
            "param" => {
                let location = parameters.len();
                parameters.push(parse_parameter(child, Some(location), types)?);
            }
            "alias" => alias = child.owned_attribute("name"),
            // vecequiv, glx: not needed for calling anything
            _ => (),
        }
    }

    let mut return_type = proto.ok_or_else(|| RegistryError::MissingName("command".to_string()))?;
    let name = return_type
        .name
        .take()
        .ok_or_else(|| RegistryError::MissingName("proto".to_string()))?;

    let mut command = Command {
        name,
        return_type,
        parameters,
        alias,
    };
    command.link_lengths();
    Ok(command)
}

fn parse_interface(element: &Element, kind: InterfaceKind) -> Result<Interface, RegistryError> {
    let mut items = Vec::new();
    for child in element.elements() {
        let item_kind = ItemKind::from_tag(&child.tag)
            .ok_or_else(|| RegistryError::BadInterfaceItem(child.tag.clone()))?;
        items.push(InterfaceItem {
            kind: item_kind,
            name: required_attribute(child, "name")?,
            comment: child.owned_attribute("comment"),
        });
    }
    Ok(Interface {
        kind,
        profile: element.owned_attribute("profile"),
        api: element.owned_attribute("api"),
        comment: element.owned_attribute("comment"),
        items,
    })
}

fn parse_feature(element: &Element) -> Result<Feature, RegistryError> {
    let number = required_attribute(element, "number")?;
    let version: ApiNumber = number
        .parse()
        .map_err(|()| RegistryError::BadVersion(number.clone()))?;

    let mut interfaces = Vec::new();
    for child in element.elements() {
        let kind = match child.tag.as_str() {
            "require" => InterfaceKind::Require,
            "remove" => InterfaceKind::Remove,
            _ => {
                return Err(RegistryError::BadInterface {
                    parent: element.tag.clone(),
                    tag: child.tag.clone(),
                })
            }
        };
        interfaces.push(parse_interface(child, kind)?);
    }

    Ok(Feature {
        api: required_attribute(element, "api")?,
        name: required_attribute(element, "name")?,
        version,
        protect: element.owned_attribute("protect"),
        comment: element.owned_attribute("comment"),
        interfaces,
    })
}

fn parse_extension(element: &Element) -> Result<Extension, RegistryError> {
    let mut interfaces = Vec::new();
    for child in element.elements() {
        if child.tag != "require" {
            return Err(RegistryError::BadInterface {
                parent: element.tag.clone(),
                tag: child.tag.clone(),
            });
        }
        interfaces.push(parse_interface(child, InterfaceKind::Require)?);
    }

    let supported = required_attribute(element, "supported")?;
    Extension::new(
        required_attribute(element, "name")?,
        supported.clone(),
        element.owned_attribute("protect"),
        element.owned_attribute("comment"),
        interfaces,
    )
    .map_err(|source| RegistryError::BadPattern {
        pattern: supported,
        source,
    })
}
