/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! dynGL binds OpenGL-family APIs at runtime, driven by the Khronos XML
//! registry.
//!
//! The pipeline has four stages:
//! - [registry]: parse the registry document into types, enumerants, commands,
//!   features and extensions.
//! - [resolver]: compute the exact set of enumerants and commands for an API,
//!   version and profile, plus any extensions.
//! - [binding]: look up each command in a native library and decide how its
//!   parameters are marshalled, so it can be called with high-level
//!   arguments.
//! - [namespace]: tie it all together in a [namespace::Session].
//!
//! The terms "registry command" and "bound command" are used to distinguish
//! between the description of a command in the registry, which exists for
//! every API, and a command that has been found in a particular library and
//! is ready to be called.

// Allow the crate to have a non-snake-case name (dynGL).
// This also allows items in the crate to have non-snake-case names.
#![allow(non_snake_case)]

#[macro_use]
mod log;
pub mod abi;
pub mod binding;
pub mod buffer;
pub mod error;
pub mod namespace;
pub mod options;
pub mod registry;
pub mod resolver;

use namespace::Session;
use options::Options;
use registry::Registry;
use resolver::{ResolvedApi, Resolver};

const USAGE: &str = "\
Usage:
    dynGL [options] [names...]

Resolves an API from the OpenGL registry and prints the C prototypes of its
commands. If names of commands or enumerants are given, only those are shown.
With --library=..., the commands are also bound to that library, and their
high-level signatures and any commands that couldn't be bound are shown.

Special options:
    --help
        Display this help text.

    --list-apis
        List the APIs and versions in the registry, then exit.
";

fn load_registry(options: &Options) -> Result<Registry, String> {
    let registry = match &options.registry {
        Some(path) if options.validate => std::fs::read_to_string(path)
            .map_err(error::RegistryError::from)
            .and_then(|text| Registry::parse_validated(&text)),
        Some(path) => Registry::from_path(path),
        None if options.validate => {
            Registry::parse_validated(&String::from_utf8_lossy(khronos_api::GL_XML))
        }
        None => Registry::bundled_gl(),
    };
    registry.map_err(|e| format!("Could not load the registry: {}", e))
}

fn print_summary(api: &ResolvedApi) {
    echo!(
        "{} {} ({}): {} enumerants, {} commands",
        api.api,
        api.version,
        api.profile.as_deref().unwrap_or("all profiles"),
        api.enums.len(),
        api.commands.len()
    );
    if !api.extensions().is_empty() {
        echo!("Extensions: {}", api.extensions().join(", "));
    }
    echo!();
}

fn print_resolved(api: &ResolvedApi, names: &[String]) -> Result<(), String> {
    if names.is_empty() {
        for command in api.commands.iter() {
            echo!("{}", command.prototype());
        }
        return Ok(());
    }
    for name in names {
        if let Some(enum_) = api.enums.get(name) {
            echo!("#define {} {}", enum_.name, enum_.c_literal());
        } else if let Some(command) = api.commands.get(name) {
            echo!("{}", command.prototype());
        } else {
            return Err(format!("{} is not part of {} {}", name, api.api, api.version));
        }
    }
    Ok(())
}

fn print_bound(session: &Session, names: &[String]) -> Result<(), String> {
    let gl = session.namespace();
    if names.is_empty() {
        echo!("{} commands bound.", gl.commands().count());
        if !gl.skipped().is_empty() {
            echo!("Skipped:");
            for (name, reason) in gl.skipped() {
                echo!("- {}: {}", name, reason);
            }
        }
        return Ok(());
    }
    for name in names {
        if let Some(value) = gl.enum_value(name) {
            echo!("{} = {:#x}", name, value);
        } else if let Some(command) = gl.command(name) {
            echo!("{}", command.command().prototype());
            echo!("    {}", command.signature());
        } else if let Some((_, reason)) = gl.skipped().iter().find(|(skipped, _)| skipped == name)
        {
            echo!("{}: skipped: {}", name, reason);
        } else {
            return Err(format!("{} is not part of {}", name, session.api().api));
        }
    }
    Ok(())
}

pub fn main<T: Iterator<Item = String>>(mut args: T) -> Result<(), String> {
    log::init();

    let _ = args.next(); // skip argv[0]

    let mut options = Options::default();
    let mut names = Vec::new();
    let mut list_apis = false;
    for arg in args {
        if arg == "--help" {
            echo!("{}", USAGE);
            echo!("{}", options::DOCUMENTATION);
            return Ok(());
        } else if arg == "--list-apis" {
            list_apis = true;
        } else if options.parse_argument(&arg)? {
            continue;
        } else if arg.starts_with("--") {
            echo!("{}", USAGE);
            echo!("{}", options::DOCUMENTATION);
            return Err(format!("Unexpected argument: {:?}", arg));
        } else {
            names.push(arg);
        }
    }

    let registry = load_registry(&options)?;

    if list_apis {
        for api in registry.apis() {
            let versions: Vec<String> = registry
                .features()
                .iter()
                .filter(|feature| feature.api == api)
                .map(|feature| feature.version.to_string())
                .collect();
            echo!("{}: {}", api, versions.join(" "));
        }
        return Ok(());
    }

    if options.library.is_some() {
        let session = Session::open(&registry, &options).map_err(|e| e.to_string())?;
        print_summary(session.api());
        return print_bound(&session, &names);
    }

    let Some(version) = options.version else {
        return Err(
            "No version specified. Use --version=..., or --library=... to ask the library."
                .to_string(),
        );
    };
    let resolver = Resolver::new(&registry).with_apis(options.apis.iter().cloned());
    let mut api = resolver
        .generate_api(&options.api, version, options.profile.as_deref())
        .map_err(|e| e.to_string())?;
    for extension in &options.extensions {
        api.merge_extension(&registry, extension)
            .map_err(|e| e.to_string())?;
    }
    print_summary(&api);
    print_resolved(&api, &names)
}
