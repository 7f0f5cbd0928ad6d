/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Parsing and management of user-configurable options, e.g. which API to
//! resolve and which library to bind it to.

use crate::binding::Directives;
use crate::registry::ApiNumber;
use crate::resolver::DEFAULT_APIS;
use std::path::PathBuf;

pub const DOCUMENTATION: &str = "\
API options:
    --api=...
        The API to resolve, as named in the registry: gl, gles1, gles2, glsc2
        and so on. The default is gl.

    --version=...
        The API version to resolve, e.g. 3.3. If this isn't specified, the
        version reported by the library (glGetString(GL_VERSION)) is used.

    --profile=...
        Restrict the API to one profile, e.g. core or compatibility. By default
        the requirements of every profile apply.

    --extension=...
        Also include an extension, e.g. GL_ARB_debug_output. This option can be
        given more than once.

    --apis=...
        Comma-separated list of API names that may be requested. The default
        is gl,glcore,gles1,gles2,glsc2.

Registry options:
    --registry=...
        Path to the registry XML file. By default, the gl.xml bundled with
        dynGL is used.

    --validate
        Check the registry document's structure before parsing it, and report
        anything unexpected.

Library options:
    --library=...
        Path to the OpenGL library to bind commands to, e.g. libGL.so.1. Without
        this, the API is resolved but nothing is bound.

    --loader=...
        Name of a function in the library that looks up other functions, e.g.
        glXGetProcAddressARB or eglGetProcAddress. Commands the library doesn't
        export directly are looked up through it.

    --check-version
        Refuse to bind if the library reports an older version than the one
        requested with --version.

    --check-errors
        Check glGetError after every call.

    --null-parameter=...
        Always pass null for a parameter, in the form command:parameter, e.g.
        glShaderSource:length (which is always done). This option can be given
        more than once.
";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub api: String,
    pub version: Option<ApiNumber>,
    pub profile: Option<String>,
    pub extensions: Vec<String>,
    pub apis: Vec<String>,
    pub registry: Option<PathBuf>,
    pub validate: bool,
    pub library: Option<String>,
    pub loader: Option<String>,
    pub check_version: bool,
    pub check_errors: bool,
    pub null_parameters: Vec<(String, String)>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            api: "gl".to_string(),
            version: None,
            profile: None,
            extensions: Vec::new(),
            apis: DEFAULT_APIS.iter().map(|api| api.to_string()).collect(),
            registry: None,
            validate: false,
            library: None,
            loader: None,
            check_version: false,
            check_errors: false,
            null_parameters: Vec::new(),
        }
    }
}

impl Options {
    /// Parse an argument. Returns [Ok(true)] if the argument was a valid
    /// option, [Ok(false)] if it's not an option, or [Err] if it's an option
    /// with an invalid value.
    pub fn parse_argument(&mut self, arg: &str) -> Result<bool, String> {
        if let Some(value) = arg.strip_prefix("--api=") {
            if value.is_empty() {
                return Err("API name must not be empty".to_string());
            }
            self.api = value.to_string();
        } else if let Some(value) = arg.strip_prefix("--version=") {
            self.version = Some(
                value
                    .parse()
                    .map_err(|_| format!("Invalid API version {:?}, expected e.g. 3.3", value))?,
            );
        } else if let Some(value) = arg.strip_prefix("--profile=") {
            self.profile = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--extension=") {
            self.extensions.push(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--apis=") {
            self.apis = value
                .split(',')
                .map(str::trim)
                .filter(|api| !api.is_empty())
                .map(str::to_string)
                .collect();
            if self.apis.is_empty() {
                return Err("At least one API must be listed".to_string());
            }
        } else if let Some(value) = arg.strip_prefix("--registry=") {
            self.registry = Some(PathBuf::from(value));
        } else if arg == "--validate" {
            self.validate = true;
        } else if let Some(value) = arg.strip_prefix("--library=") {
            self.library = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("--loader=") {
            self.loader = Some(value.to_string());
        } else if arg == "--check-version" {
            self.check_version = true;
        } else if arg == "--check-errors" {
            self.check_errors = true;
        } else if let Some(value) = arg.strip_prefix("--null-parameter=") {
            let (command, parameter) = value
                .split_once(':')
                .filter(|(command, parameter)| !command.is_empty() && !parameter.is_empty())
                .ok_or_else(|| "Incorrect null parameter syntax".to_string())?;
            self.null_parameters
                .push((command.to_string(), parameter.to_string()));
        } else {
            return Ok(false);
        };
        Ok(true)
    }

    /// The built-in directives plus any given with `--null-parameter=`.
    pub fn directives(&self) -> Directives {
        self.null_parameters
            .iter()
            .fold(Directives::default(), |directives, (command, parameter)| {
                directives.with_null_parameter(command, parameter)
            })
    }
}
