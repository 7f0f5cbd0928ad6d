/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Enumerants (`<enums>`) and enumerant groups (`<groups>`).

use std::collections::HashMap;

/// The C suffix that gives an enumerant a wider type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumSuffix {
    /// `u`, i.e. `unsigned int`.
    Unsigned,
    /// `ull`, i.e. `unsigned long long`.
    UnsignedLongLong,
}

impl EnumSuffix {
    pub fn parse(text: &str) -> Option<EnumSuffix> {
        match text {
            "u" => Some(EnumSuffix::Unsigned),
            "ull" => Some(EnumSuffix::UnsignedLongLong),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    /// Two's complement bits, so that `-1` and `0xFFFFFFFFFFFFFFFF` both fit.
    pub value: u64,
    pub suffix: Option<EnumSuffix>,
    pub api: Option<String>,
    pub alias: Option<String>,
    pub comment: Option<String>,
}

impl Enum {
    /// The value as written for a C compiler, e.g. `0x8B31` or `0xFFFFFFFFu`.
    pub fn c_literal(&self) -> String {
        let suffix = match self.suffix {
            None => "",
            Some(EnumSuffix::Unsigned) => "u",
            Some(EnumSuffix::UnsignedLongLong) => "ull",
        };
        if self.suffix.is_none() && (self.value as i64) < 0 && (self.value as i64) >= -0x8000_0000
        {
            format!("{}", self.value as i64)
        } else {
            format!("{:#X}{}", self.value, suffix)
        }
    }
}

/// Parse an integer literal: `0x` hexadecimal or decimal, with an optional
/// leading `-`.
pub fn parse_integer(text: &str) -> Option<u64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()?
    } else {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()?
    };
    if negative {
        if magnitude > 1 << 63 {
            return None;
        }
        Some(magnitude.wrapping_neg())
    } else {
        Some(magnitude)
    }
}

/// One `<enums>` block with its enumerants.
#[derive(Debug, Clone, Default)]
pub struct EnumsBlock {
    pub namespace: Option<String>,
    pub group: Option<String>,
    pub type_: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub vendor: Option<String>,
    pub comment: Option<String>,
    enums: Vec<Enum>,
    by_name: HashMap<(String, Option<String>), usize>,
    by_value: HashMap<u64, usize>,
}

impl EnumsBlock {
    /// Add an enumerant. The same name may appear once per API scope; on
    /// conflict the offending enumerant is handed back.
    pub(super) fn insert(&mut self, enum_: Enum) -> Result<(), Enum> {
        let key = (enum_.name.clone(), enum_.api.clone());
        if self.by_name.contains_key(&key) {
            return Err(enum_);
        }
        let index = self.enums.len();
        self.by_name.insert(key, index);
        self.by_value.entry(enum_.value).or_insert(index);
        self.enums.push(enum_);
        Ok(())
    }

    pub fn enums(&self) -> &[Enum] {
        &self.enums
    }

    pub fn get(&self, name: &str) -> Option<&Enum> {
        self.by_name
            .get(&(name.to_string(), None))
            .map(|&i| &self.enums[i])
            .or_else(|| self.enums.iter().find(|e| e.name == name))
    }

    pub fn get_by_value(&self, value: u64) -> Option<&Enum> {
        self.by_value.get(&value).map(|&i| &self.enums[i])
    }
}

/// A `<group>`: a named list of enumerants that are valid for some parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub comment: Option<String>,
    pub enums: Vec<String>,
}
