/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Sessions: a resolved API bound to a library, and the namespace of
//! enumerants and commands it exposes.
//!
//! A [Session] is what most users of this crate want. It resolves the
//! requested API from a [Registry], binds every command against a
//! [NativeLibrary], and collects the results in a [Namespace]:
//!
//! ```ignore
//! let registry = Registry::bundled_gl()?;
//! let session = Session::open(&registry, &options)?;
//! let gl = session.namespace();
//! if let Some(gen_buffers) = gl.command("glGenBuffers") {
//!     let buffers = gen_buffers.call([Arg::from(4)])?;
//! }
//! ```

mod program;

pub use program::{
    GL_ACTIVE_UNIFORMS, GL_ACTIVE_UNIFORM_BLOCKS, GL_ACTIVE_UNIFORM_BLOCK_MAX_NAME_LENGTH,
    GL_UNIFORM_BLOCK_ACTIVE_UNIFORMS, GL_UNIFORM_BLOCK_ACTIVE_UNIFORM_INDICES,
};

use crate::abi::{DynamicLibrary, NativeLibrary, RawValue};
use crate::binding::{BindOutcome, Binder, BoundCommand, ErrorChecker, SkipReason};
use crate::buffer::Primitive;
use crate::error::{CallError, SessionError};
use crate::options::Options;
use crate::registry::{ApiNumber, Registry};
use crate::resolver::{ResolvedApi, ResolvedEnums, Resolver};
use std::collections::BTreeMap;
use std::ffi::CStr;
use std::rc::Rc;

/// `GL_VERSION`, for `glGetString`.
pub const GL_VERSION: u32 = 0x1F02;

/// Anything a name can refer to in a [Namespace].
#[derive(Debug, Copy, Clone)]
pub enum Symbol<'a> {
    Enum(u64),
    Command(&'a BoundCommand),
}

/// The enumerants and bound commands of one resolved API.
#[derive(Debug)]
pub struct Namespace {
    enums: ResolvedEnums,
    commands: BTreeMap<String, BoundCommand>,
    skipped: Vec<(String, SkipReason)>,
}

impl Namespace {
    /// Bind every command of `api`. Commands that can't be bound are left out
    /// and recorded, see [Namespace::skipped].
    pub fn build(api: &ResolvedApi, binder: &Binder) -> Namespace {
        let mut commands = BTreeMap::new();
        let mut skipped = Vec::new();
        for command in api.commands.iter() {
            match binder.bind(command) {
                BindOutcome::Bound(bound) => {
                    commands.insert(command.name.clone(), bound);
                }
                BindOutcome::Skipped(reason) => {
                    log!("Skipping {}: {}", command.name, reason);
                    skipped.push((command.name.clone(), reason));
                }
            }
        }
        if !skipped.is_empty() {
            log_dbg!(
                "{} of {} commands could not be bound",
                skipped.len(),
                api.commands.len()
            );
        }
        Namespace {
            enums: api.enums.clone(),
            commands,
            skipped,
        }
    }

    pub fn enum_value(&self, name: &str) -> Option<u64> {
        self.enums.value(name)
    }

    /// The name of an enumerant, for diagnostics. If several enumerants share
    /// the value, the alphabetically first one is given.
    pub fn enum_name(&self, value: u64) -> Option<&str> {
        self.enums.name_of(value)
    }

    pub fn command(&self, name: &str) -> Option<&BoundCommand> {
        self.commands.get(name)
    }

    pub fn get(&self, name: &str) -> Option<Symbol> {
        if let Some(value) = self.enum_value(name) {
            Some(Symbol::Enum(value))
        } else {
            self.command(name).map(Symbol::Command)
        }
    }

    pub fn enum_names(&self) -> impl Iterator<Item = &str> {
        self.enums.names()
    }

    pub fn commands(&self) -> impl Iterator<Item = &BoundCommand> {
        self.commands.values()
    }

    /// Commands called at least once since binding or the last reset.
    pub fn called_commands(&self) -> Vec<&BoundCommand> {
        self.commands()
            .filter(|command| command.call_count() > 0)
            .collect()
    }

    pub fn reset_call_counters(&self) {
        for command in self.commands() {
            command.reset_call_count();
        }
    }

    /// Commands of the API that were left out, and why.
    pub fn skipped(&self) -> &[(String, SkipReason)] {
        &self.skipped
    }
}

/// Ask the library which version it implements, with
/// `glGetString(GL_VERSION)`. This needs a current context on most platforms.
pub fn query_version(library: &dyn NativeLibrary) -> Option<ApiNumber> {
    let get_string = library.lookup("glGetString")?;
    // Safety: glGetString takes a GLenum and returns a static string or null.
    let text = unsafe {
        let pointer = library
            .invoke(get_string, &[RawValue::UInt32(GL_VERSION)], Primitive::Pointer)
            .as_pointer()
            .filter(|pointer| !pointer.is_null())?;
        CStr::from_ptr(pointer.cast_const().cast())
            .to_string_lossy()
            .into_owned()
    };
    let version = ApiNumber::from_version_string(&text);
    if version.is_none() {
        log!("Could not make sense of version string {:?}", text);
    }
    version
}

/// A resolved API bound to a library.
pub struct Session {
    api: ResolvedApi,
    namespace: Namespace,
    library: Rc<dyn NativeLibrary>,
    errors: ErrorChecker,
}

impl Session {
    /// Resolve the API described by `options` and bind it to `library`.
    pub fn new(
        registry: &Registry,
        library: Rc<dyn NativeLibrary>,
        options: &Options,
    ) -> Result<Session, SessionError> {
        let available = if options.version.is_none() || options.check_version {
            query_version(&*library)
        } else {
            None
        };
        let version = match (options.version, available) {
            (Some(requested), Some(available)) if requested > available => {
                return Err(SessionError::VersionUnavailable {
                    requested,
                    available,
                })
            }
            (Some(requested), _) => requested,
            (None, Some(available)) => available,
            (None, None) => return Err(SessionError::UnknownVersion),
        };

        let resolver = Resolver::new(registry).with_apis(options.apis.iter().cloned());
        let mut api = resolver.generate_api(&options.api, version, options.profile.as_deref())?;
        for extension in &options.extensions {
            api.merge_extension(registry, extension)?;
        }

        let binder =
            Binder::new(library.clone(), options.directives()).check_errors(options.check_errors);
        let namespace = Namespace::build(&api, &binder);
        log_dbg!(
            "Session for {} {}: {} enumerants, {} commands bound",
            api.api,
            api.version,
            api.enums.len(),
            namespace.commands.len()
        );

        Ok(Session {
            api,
            namespace,
            errors: ErrorChecker::new(&*library),
            library,
        })
    }

    /// Like [Session::new], but loads the library named by the options, or
    /// the platform's usual OpenGL library.
    pub fn open(registry: &Registry, options: &Options) -> Result<Session, SessionError> {
        let path = options
            .library
            .as_deref()
            .unwrap_or(DynamicLibrary::DEFAULT_PATH);
        let mut library = DynamicLibrary::open(path)?;
        if let Some(loader) = &options.loader {
            library = library.with_loader(loader);
        }
        Session::new(registry, Rc::new(library), options)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn api(&self) -> &ResolvedApi {
        &self.api
    }

    pub fn library(&self) -> &Rc<dyn NativeLibrary> {
        &self.library
    }

    /// The version the library reports, which may differ from the resolved
    /// one.
    pub fn implementation_version(&self) -> Option<ApiNumber> {
        query_version(&*self.library)
    }

    /// Fetch and clear the current error.
    pub fn check_error(&self) -> Result<(), CallError> {
        self.errors.check(&*self.library)
    }

    /// Start a batch of calls whose errors are checked together at the end,
    /// with [ErrorScope::finish]. Any error already pending is reported now.
    pub fn error_scope(&self) -> Result<ErrorScope, CallError> {
        self.check_error()?;
        Ok(ErrorScope {
            session: self,
            finished: false,
        })
    }
}

/// See [Session::error_scope]. If the scope is dropped without being
/// finished, a pending error is only logged.
pub struct ErrorScope<'s> {
    session: &'s Session,
    finished: bool,
}

impl ErrorScope<'_> {
    pub fn finish(mut self) -> Result<(), CallError> {
        self.finished = true;
        self.session.check_error()
    }
}

impl Drop for ErrorScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.session.check_error() {
            log!("Unchecked error at the end of an error scope: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::StubLibrary;
    use crate::binding::Arg;
    use std::cell::Cell;

    const REGISTRY: &str = r#"<registry>
    <types>
        <type>typedef unsigned int <name>GLenum</name>;</type>
        <type>typedef unsigned char <name>GLubyte</name>;</type>
    </types>
    <enums namespace="GL">
        <enum value="0x0500" name="GL_INVALID_ENUM"/>
        <enum value="0x1F02" name="GL_VERSION"/>
        <enum value="0x1F02" name="GL_ALSO_VERSION"/>
    </enums>
    <commands>
        <command>
            <proto><ptype>GLenum</ptype> <name>glGetError</name></proto>
        </command>
        <command>
            <proto>const <ptype>GLubyte</ptype> *<name>glGetString</name></proto>
            <param><ptype>GLenum</ptype> <name>name</name></param>
        </command>
        <command>
            <proto>void <name>glFlush</name></proto>
        </command>
        <command>
            <proto>void <name>glNewThing</name></proto>
        </command>
    </commands>
    <feature api="gl" name="GL_VERSION_1_0" number="1.0">
        <require>
            <enum name="GL_INVALID_ENUM"/>
            <enum name="GL_VERSION"/>
            <enum name="GL_ALSO_VERSION"/>
            <command name="glGetError"/>
            <command name="glGetString"/>
            <command name="glFlush"/>
        </require>
    </feature>
    <feature api="gl" name="GL_VERSION_2_0" number="2.0">
        <require>
            <command name="glNewThing"/>
        </require>
    </feature>
</registry>"#;

    static VERSION: &CStr = c"1.5.0 Test";

    fn library(error: Rc<Cell<u32>>) -> Rc<dyn NativeLibrary> {
        Rc::new(
            StubLibrary::new()
                .with_function("glGetError", move |_| RawValue::UInt32(error.replace(0)))
                .with_function("glGetString", |args| match args[0] {
                    RawValue::UInt32(GL_VERSION) => {
                        RawValue::Pointer(VERSION.as_ptr().cast_mut().cast())
                    }
                    _ => RawValue::Pointer(std::ptr::null_mut()),
                })
                .with_function("glFlush", |_| RawValue::Void),
        )
    }

    #[test]
    fn version_from_library() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let error = Rc::new(Cell::new(0));
        let session = Session::new(&registry, library(error), &Options::default()).unwrap();
        assert_eq!(session.api().version, ApiNumber::new(1, 5));
        assert_eq!(session.implementation_version(), Some(ApiNumber::new(1, 5)));

        let gl = session.namespace();
        assert_eq!(gl.enum_value("GL_VERSION"), Some(0x1F02));
        assert_eq!(gl.enum_name(0x1F02), Some("GL_ALSO_VERSION"));
        assert!(matches!(gl.get("GL_INVALID_ENUM"), Some(Symbol::Enum(0x0500))));
        assert!(matches!(gl.get("glFlush"), Some(Symbol::Command(c)) if c.name() == "glFlush"));
        assert!(gl.get("glNewThing").is_none());
        assert_eq!(gl.enum_names().count(), 3);

        let version = gl.command("glGetString").unwrap();
        assert_eq!(
            version.call([Arg::from(GL_VERSION)]).unwrap(),
            Some(crate::binding::Value::Text(Some("1.5.0 Test".to_string())))
        );
        assert_eq!(
            version.call([Arg::from(0)]).unwrap(),
            Some(crate::binding::Value::Text(None))
        );
    }

    #[test]
    fn versions() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let error = Rc::new(Cell::new(0));

        let mut options = Options::default();
        options.version = Some(ApiNumber::new(2, 0));
        let session = Session::new(&registry, library(error.clone()), &options).unwrap();
        // glNewThing is part of 2.0, but the library doesn't have it
        assert_eq!(
            session.namespace().skipped(),
            [(
                "glNewThing".to_string(),
                SkipReason::NotAvailable("glNewThing".to_string())
            )]
        );

        options.check_version = true;
        assert!(matches!(
            Session::new(&registry, library(error.clone()), &options),
            Err(SessionError::VersionUnavailable { .. })
        ));

        let without: Rc<dyn NativeLibrary> = Rc::new(StubLibrary::new());
        assert!(matches!(
            Session::new(&registry, without, &Options::default()),
            Err(SessionError::UnknownVersion)
        ));

        options.check_version = false;
        options.api = "gles2".to_string();
        options.apis = vec!["gl".to_string()];
        assert!(matches!(
            Session::new(&registry, library(error), &options),
            Err(SessionError::Resolve(_))
        ));
    }

    #[test]
    fn counters_and_errors() {
        let registry = Registry::parse(REGISTRY).unwrap();
        let error = Rc::new(Cell::new(0));
        let session =
            Session::new(&registry, library(error.clone()), &Options::default()).unwrap();
        let gl = session.namespace();
        let flush = gl.command("glFlush").unwrap();

        flush.call([]).unwrap();
        flush.call([]).unwrap();
        let called: Vec<&str> = gl
            .called_commands()
            .into_iter()
            .map(BoundCommand::name)
            .collect();
        assert_eq!(called, ["glFlush"]);
        assert_eq!(flush.call_count(), 2);
        gl.reset_call_counters();
        assert!(gl.called_commands().is_empty());

        assert_eq!(session.check_error(), Ok(()));
        error.set(0x0500);
        assert!(matches!(
            session.check_error(),
            Err(CallError::Native { code: 0x0500, .. })
        ));
        assert_eq!(session.check_error(), Ok(()));

        let scope = session.error_scope().unwrap();
        flush.call([]).unwrap();
        error.set(0x0505);
        assert!(matches!(
            scope.finish(),
            Err(CallError::Native { code: 0x0505, .. })
        ));

        error.set(0x0501);
        assert!(session.error_scope().is_err());

        // an unfinished scope still checks when dropped, but only logs
        let scope = session.error_scope().unwrap();
        error.set(0x0502);
        drop(scope);
        assert_eq!(error.get(), 0);
    }
}
