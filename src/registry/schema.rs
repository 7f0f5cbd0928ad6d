/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Structural validation of registry documents.
//!
//! This is a built-in description of which elements may appear inside which,
//! and which attributes they must carry. It is stricter than the parser, which
//! skips things it has no use for, so it is useful for catching mistakes in
//! hand-written or generated registries.

use super::xml::Element;
use std::fmt;

struct Rule {
    tag: &'static str,
    children: &'static [&'static str],
    required: &'static [&'static str],
    /// Whether character data other than whitespace may appear.
    text: bool,
}

const INTERFACE_ITEMS: &[&str] = &["type", "enum", "command"];

/// Elements the grammar knows about. `enum` depends on its parent (a value
/// definition or a reference), see [rule_for].
const RULES: &[Rule] = &[
    Rule {
        tag: "registry",
        children: &[
            "comment",
            "types",
            "kinds",
            "groups",
            "enums",
            "commands",
            "feature",
            "extensions",
        ],
        required: &[],
        text: false,
    },
    Rule {
        tag: "comment",
        children: &[],
        required: &[],
        text: true,
    },
    Rule {
        tag: "types",
        children: &["type"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "type",
        children: &["name", "apientry"],
        required: &[],
        text: true,
    },
    Rule {
        tag: "kinds",
        children: &["kind"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "kind",
        children: &[],
        required: &["name"],
        text: false,
    },
    Rule {
        tag: "groups",
        children: &["group"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "group",
        children: &["enum"],
        required: &["name"],
        text: false,
    },
    Rule {
        tag: "enums",
        children: &["enum", "unused"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "unused",
        children: &[],
        required: &["start"],
        text: false,
    },
    Rule {
        tag: "commands",
        children: &["command"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "command",
        children: &["proto", "param", "alias", "vecequiv", "glx"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "proto",
        children: &["ptype", "name"],
        required: &[],
        text: true,
    },
    Rule {
        tag: "param",
        children: &["ptype", "name"],
        required: &[],
        text: true,
    },
    Rule {
        tag: "ptype",
        children: &[],
        required: &[],
        text: true,
    },
    Rule {
        tag: "name",
        children: &[],
        required: &[],
        text: true,
    },
    Rule {
        tag: "apientry",
        children: &[],
        required: &[],
        text: false,
    },
    Rule {
        tag: "alias",
        children: &[],
        required: &["name"],
        text: false,
    },
    Rule {
        tag: "vecequiv",
        children: &[],
        required: &["name"],
        text: false,
    },
    Rule {
        tag: "glx",
        children: &[],
        required: &["type", "opcode"],
        text: false,
    },
    Rule {
        tag: "feature",
        children: &["require", "remove"],
        required: &["api", "name", "number"],
        text: false,
    },
    Rule {
        tag: "extensions",
        children: &["extension"],
        required: &[],
        text: false,
    },
    Rule {
        tag: "extension",
        children: &["require"],
        required: &["name", "supported"],
        text: false,
    },
    Rule {
        tag: "require",
        children: INTERFACE_ITEMS,
        required: &[],
        text: false,
    },
    Rule {
        tag: "remove",
        children: INTERFACE_ITEMS,
        required: &[],
        text: false,
    },
];

const ENUM_DEFINITION: Rule = Rule {
    tag: "enum",
    children: &[],
    required: &["name", "value"],
    text: false,
};
const NAME_REFERENCE: Rule = Rule {
    tag: "*",
    children: &[],
    required: &["name"],
    text: false,
};

fn rule_for(tag: &str, parent: Option<&str>) -> Option<&'static Rule> {
    match (tag, parent) {
        ("enum", Some("enums")) => Some(&ENUM_DEFINITION),
        ("enum" | "type" | "command", Some("require" | "remove")) => Some(&NAME_REFERENCE),
        ("enum", Some("group")) => Some(&NAME_REFERENCE),
        (tag, _) => RULES.iter().find(|rule| rule.tag == tag),
    }
}

/// Something in the document that doesn't fit the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Slash-separated element path, with positions, e.g.
    /// `registry/commands[3]/command[12]`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Check a document tree against the registry grammar. An empty list means
/// the document is valid.
pub fn validate(root: &Element) -> Vec<Violation> {
    let mut violations = Vec::new();
    if root.tag != "registry" {
        violations.push(Violation {
            path: root.tag.clone(),
            message: "root element must be <registry>".to_string(),
        });
        return violations;
    }
    check(root, None, &root.tag, &mut violations);
    violations
}

fn check(element: &Element, parent: Option<&str>, path: &str, violations: &mut Vec<Violation>) {
    let Some(rule) = rule_for(&element.tag, parent) else {
        violations.push(Violation {
            path: path.to_string(),
            message: format!("unknown element <{}>", element.tag),
        });
        return;
    };

    for &attribute in rule.required {
        if element.attribute(attribute).is_none() {
            violations.push(Violation {
                path: path.to_string(),
                message: format!("missing required attribute {:?}", attribute),
            });
        }
    }

    if !rule.text {
        let has_text = element.children.iter().any(|node| match node {
            super::xml::Node::Text(text) => !text.trim().is_empty(),
            super::xml::Node::Element(_) => false,
        });
        if has_text {
            violations.push(Violation {
                path: path.to_string(),
                message: "unexpected text".to_string(),
            });
        }
    }

    for (i, child) in element.elements().enumerate() {
        let child_path = format!("{}/{}[{}]", path, child.tag, i);
        if !rule.children.contains(&child.tag.as_str()) {
            violations.push(Violation {
                path: child_path,
                message: format!("<{}> is not allowed inside <{}>", child.tag, element.tag),
            });
            continue;
        }
        check(child, Some(&element.tag), &child_path, violations);
    }
}
