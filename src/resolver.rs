/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
//! Working out which enumerants and commands make up a particular API, version
//! and profile.
//!
//! Features are applied in document order. Each applicable `<require>` adds
//! its items to the working set and each applicable `<remove>` takes them out
//! again, so e.g. the core profile of OpenGL 3.2 ends up without the commands
//! that were deprecated in 3.0. Items are identified by name only.

use crate::error::ResolveError;
use crate::registry::{
    ApiNumber, Command, Enum, Interface, InterfaceKind, ItemKind, Registry,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// APIs a [Resolver] accepts unless told otherwise.
pub const DEFAULT_APIS: &[&str] = &["gl", "glcore", "gles1", "gles2", "glsc2"];

pub struct Resolver<'r> {
    registry: &'r Registry,
    apis: Vec<String>,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r Registry) -> Resolver<'r> {
        Resolver {
            registry,
            apis: DEFAULT_APIS.iter().map(|api| api.to_string()).collect(),
        }
    }

    /// Replace the set of API names that may be requested.
    pub fn with_apis<I, S>(mut self, apis: I) -> Resolver<'r>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apis = apis.into_iter().map(Into::into).collect();
        self
    }

    pub fn supports_api(&self, api: &str) -> bool {
        self.apis.iter().any(|supported| supported == api)
    }

    /// Compute the enumerants and commands of `api` at `version`, optionally
    /// restricted to one `profile`. With no profile, blocks for every profile
    /// apply.
    pub fn generate_api(
        &self,
        api: &str,
        version: ApiNumber,
        profile: Option<&str>,
    ) -> Result<ResolvedApi, ResolveError> {
        let start = Instant::now();

        if !self.supports_api(api) {
            return Err(ResolveError::UnsupportedApi(api.to_string()));
        }

        let superset = enum_superset(self.registry, api)?;

        let mut items: BTreeMap<&str, ItemKind> = BTreeMap::new();
        for feature in self.registry.features() {
            if feature.api != api || feature.version > version {
                continue;
            }
            for interface in &feature.interfaces {
                if !interface.applies_to(api, profile) {
                    continue;
                }
                apply_interface(&mut items, interface);
            }
        }

        let mut resolved = ResolvedApi {
            api: api.to_string(),
            version,
            profile: profile.map(str::to_string),
            enums: ResolvedEnums::default(),
            commands: ResolvedCommands::default(),
            extensions: Vec::new(),
        };
        for (name, kind) in items {
            resolved.add_item(self.registry, &superset, kind, name)?;
        }

        log_dbg!(
            "Resolved {} {} ({}): {} enumerants, {} commands in {:?}",
            api,
            version,
            profile.unwrap_or("any profile"),
            resolved.enums.len(),
            resolved.commands.len(),
            start.elapsed()
        );

        Ok(resolved)
    }
}

fn apply_interface<'a>(items: &mut BTreeMap<&'a str, ItemKind>, interface: &'a Interface) {
    for item in &interface.items {
        match interface.kind {
            InterfaceKind::Require => {
                items.insert(&item.name, item.kind);
            }
            InterfaceKind::Remove => {
                items.remove(item.name.as_str());
            }
        }
    }
}

/// All enumerants that exist for `api`, from every block.
fn enum_superset<'a>(
    registry: &'a Registry,
    api: &str,
) -> Result<HashMap<&'a str, &'a Enum>, ResolveError> {
    let mut superset = HashMap::new();
    for block in registry.enum_blocks() {
        for enum_ in block.enums() {
            if enum_.api.as_deref().map_or(false, |own| own != api) {
                continue;
            }
            if superset.insert(enum_.name.as_str(), enum_).is_some() {
                return Err(ResolveError::DuplicateEnum(enum_.name.clone()));
            }
        }
    }
    Ok(superset)
}

/// The enumerants of a resolved API, sorted by name and indexed by value.
#[derive(Debug, Default, Clone)]
pub struct ResolvedEnums {
    by_name: BTreeMap<String, Enum>,
    by_value: HashMap<u64, String>,
}

impl ResolvedEnums {
    fn insert(&mut self, enum_: Enum) {
        // The alphabetically first name owns a value, whatever the order of
        // insertion.
        match self.by_value.get(&enum_.value) {
            Some(owner) if *owner <= enum_.name => (),
            _ => {
                self.by_value.insert(enum_.value, enum_.name.clone());
            }
        }
        self.by_name.insert(enum_.name.clone(), enum_);
    }

    pub fn get(&self, name: &str) -> Option<&Enum> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<u64> {
        self.get(name).map(|e| e.value)
    }

    /// A name for a value, if any enumerant has it.
    pub fn name_of(&self, value: u64) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Enum> {
        self.by_name.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// The commands of a resolved API, sorted by name.
#[derive(Debug, Default, Clone)]
pub struct ResolvedCommands {
    by_name: BTreeMap<String, Command>,
}

impl ResolvedCommands {
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.by_name.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// The outcome of resolution: everything a caller may use for one request.
#[derive(Debug, Clone)]
pub struct ResolvedApi {
    pub api: String,
    pub version: ApiNumber,
    pub profile: Option<String>,
    pub enums: ResolvedEnums,
    pub commands: ResolvedCommands,
    extensions: Vec<String>,
}

impl ResolvedApi {
    fn add_item(
        &mut self,
        registry: &Registry,
        superset: &HashMap<&str, &Enum>,
        kind: ItemKind,
        name: &str,
    ) -> Result<(), ResolveError> {
        let broken = || ResolveError::BrokenReference {
            kind: kind.as_str(),
            name: name.to_string(),
        };
        match kind {
            ItemKind::Enum => {
                let enum_ = superset.get(name).ok_or_else(broken)?;
                self.enums.insert((*enum_).clone());
            }
            ItemKind::Command => {
                let command = registry.command(name).ok_or_else(broken)?;
                self.commands
                    .by_name
                    .insert(command.name.clone(), command.clone());
            }
            // Types only matter for C headers.
            ItemKind::Type => (),
        }
        Ok(())
    }

    /// Add the enumerants and commands required by an extension. Nothing is
    /// ever removed by an extension, and items that are already present are
    /// left alone.
    pub fn merge_extension(&mut self, registry: &Registry, name: &str) -> Result<(), ResolveError> {
        let extension = registry
            .extension(name)
            .ok_or_else(|| ResolveError::UnknownExtension(name.to_string()))?;
        if !extension.supports(&self.api) {
            return Err(ResolveError::ExtensionNotSupported {
                extension: name.to_string(),
                api: self.api.clone(),
            });
        }
        if self.extensions.iter().any(|merged| merged == name) {
            return Ok(());
        }

        let superset = enum_superset(registry, &self.api)?;
        let (enums_before, commands_before) = (self.enums.len(), self.commands.len());
        for interface in &extension.interfaces {
            if !interface.applies_to(&self.api, self.profile.as_deref()) {
                continue;
            }
            for item in &interface.items {
                let present = match item.kind {
                    ItemKind::Enum => self.enums.contains(&item.name),
                    ItemKind::Command => self.commands.contains(&item.name),
                    ItemKind::Type => true,
                };
                if !present {
                    self.add_item(registry, &superset, item.kind, &item.name)?;
                }
            }
        }
        self.extensions.push(name.to_string());

        log_dbg!(
            "Merged {}: {} enumerants, {} commands added",
            name,
            self.enums.len() - enums_before,
            self.commands.len() - commands_before
        );
        Ok(())
    }

    /// Extensions merged so far, in merge order.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSIONS: &str = r#"<registry>
    <enums namespace="GL">
        <enum value="0x1" name="GL_A"/>
        <enum value="0x2" name="GL_B"/>
        <enum value="0x3" name="GL_C"/>
        <enum value="0x4" name="GL_ES_ONLY" api="gles2"/>
        <enum value="0x5" name="GL_X"/>
        <enum value="0x1" name="GL_A_ALIAS"/>
    </enums>
    <commands>
        <command><proto>void <name>glOne</name></proto></command>
        <command><proto>void <name>glTwo</name></proto></command>
        <command><proto>void <name>glLegacy</name></proto></command>
        <command><proto>void <name>glExt</name></proto></command>
    </commands>
    <feature api="gl" name="GL_VERSION_1_0" number="1.0">
        <require>
            <enum name="GL_A"/>
            <enum name="GL_A_ALIAS"/>
            <command name="glOne"/>
            <command name="glLegacy"/>
            <type name="GLint"/>
        </require>
    </feature>
    <feature api="gl" name="GL_VERSION_2_0" number="2.0">
        <require>
            <enum name="GL_B"/>
            <command name="glTwo"/>
        </require>
    </feature>
    <feature api="gl" name="GL_VERSION_3_2" number="3.2">
        <require profile="compatibility"><enum name="GL_C"/></require>
        <remove profile="core"><command name="glLegacy"/></remove>
    </feature>
    <feature api="gl" name="GL_VERSION_4_0" number="4.0">
        <remove><enum name="GL_B"/></remove>
    </feature>
    <feature api="gl" name="GL_VERSION_4_1" number="4.1">
        <require><enum name="GL_B"/></require>
    </feature>
    <feature api="gles2" name="GL_ES_VERSION_2_0" number="2.0">
        <require><enum name="GL_ES_ONLY"/><enum name="GL_A"/></require>
    </feature>
    <extensions>
        <extension name="GL_ARB_ext" supported="gl|glcore">
            <require><enum name="GL_X"/><command name="glExt"/><command name="glOne"/></require>
            <require api="gles2"><enum name="GL_ES_ONLY"/></require>
        </extension>
        <extension name="GL_OES_ext" supported="gles2">
            <require><enum name="GL_X"/></require>
        </extension>
    </extensions>
</registry>"#;

    fn names(api: &ResolvedApi) -> (Vec<String>, Vec<String>) {
        (
            api.enums.names().map(str::to_string).collect(),
            api.commands.names().map(str::to_string).collect(),
        )
    }

    #[test]
    fn versions_accumulate() {
        let registry = Registry::parse(VERSIONS).unwrap();
        let resolver = Resolver::new(&registry);

        let api = resolver.generate_api("gl", ApiNumber::new(1, 0), None).unwrap();
        assert_eq!(
            names(&api),
            (
                vec!["GL_A".to_string(), "GL_A_ALIAS".to_string()],
                vec!["glLegacy".to_string(), "glOne".to_string()]
            )
        );
        assert_eq!(api.enums.value("GL_A"), Some(1));
        assert_eq!(api.enums.name_of(1), Some("GL_A"));
        assert_eq!(api.enums.name_of(99), None);

        let api = resolver.generate_api("gl", ApiNumber::new(2, 1), None).unwrap();
        assert!(api.enums.contains("GL_B"));
        assert!(api.commands.contains("glTwo"));
    }

    #[test]
    fn monotonic_without_removals() {
        let registry = Registry::parse(VERSIONS).unwrap();
        let resolver = Resolver::new(&registry);
        let versions = [(1, 0), (2, 0), (3, 2)];
        let mut previous: Option<ResolvedApi> = None;
        for (major, minor) in versions {
            let api = resolver
                .generate_api("gl", ApiNumber::new(major, minor), Some("compatibility"))
                .unwrap();
            if let Some(previous) = previous {
                assert!(previous.enums.names().all(|n| api.enums.contains(n)));
                assert!(previous.commands.names().all(|n| api.commands.contains(n)));
            }
            previous = Some(api);
        }
    }

    #[test]
    fn profiles() {
        let registry = Registry::parse(VERSIONS).unwrap();
        let resolver = Resolver::new(&registry);
        let v = ApiNumber::new(3, 2);

        let core = resolver.generate_api("gl", v, Some("core")).unwrap();
        assert!(!core.commands.contains("glLegacy"));
        assert!(!core.enums.contains("GL_C"));

        let compatibility = resolver.generate_api("gl", v, Some("compatibility")).unwrap();
        assert!(compatibility.commands.contains("glLegacy"));
        assert!(compatibility.enums.contains("GL_C"));

        // no profile: every block applies, removals included
        let any = resolver.generate_api("gl", v, None).unwrap();
        assert!(!any.commands.contains("glLegacy"));
        assert!(any.enums.contains("GL_C"));
    }

    #[test]
    fn remove_then_require() {
        let registry = Registry::parse(VERSIONS).unwrap();
        let resolver = Resolver::new(&registry);
        let b_at = |major, minor| {
            resolver
                .generate_api("gl", ApiNumber::new(major, minor), Some("core"))
                .unwrap()
                .enums
                .contains("GL_B")
        };
        assert!(b_at(3, 2));
        assert!(!b_at(4, 0));
        assert!(b_at(4, 1));
    }

    #[test]
    fn api_scoping() {
        let registry = Registry::parse(VERSIONS).unwrap();
        let resolver = Resolver::new(&registry);

        let es = resolver.generate_api("gles2", ApiNumber::new(2, 0), None).unwrap();
        assert_eq!(es.enums.value("GL_ES_ONLY"), Some(4));
        assert!(es.commands.is_empty());

        assert!(matches!(
            resolver.generate_api("vulkan", ApiNumber::new(1, 0), None),
            Err(ResolveError::UnsupportedApi(_))
        ));
        let resolver = Resolver::new(&registry).with_apis(["gl"]);
        assert!(matches!(
            resolver.generate_api("gles2", ApiNumber::new(2, 0), None),
            Err(ResolveError::UnsupportedApi(_))
        ));
    }

    #[test]
    fn broken_references() {
        let registry = Registry::parse(
            r#"<registry>
            <feature api="gl" name="GL_VERSION_1_0" number="1.0">
                <require><command name="glMissing"/></require>
            </feature>
        </registry>"#,
        )
        .unwrap();
        assert!(matches!(
            Resolver::new(&registry).generate_api("gl", ApiNumber::new(1, 0), None),
            Err(ResolveError::BrokenReference { kind: "command", .. })
        ));

        let registry = Registry::parse(
            r#"<registry>
            <enums><enum value="1" name="GL_A"/></enums>
            <enums><enum value="2" name="GL_A"/></enums>
        </registry>"#,
        )
        .unwrap();
        assert!(matches!(
            Resolver::new(&registry).generate_api("gl", ApiNumber::new(1, 0), None),
            Err(ResolveError::DuplicateEnum(_))
        ));
    }

    #[test]
    fn extensions() {
        let registry = Registry::parse(VERSIONS).unwrap();
        let resolver = Resolver::new(&registry);
        let mut api = resolver.generate_api("gl", ApiNumber::new(1, 0), None).unwrap();

        api.merge_extension(&registry, "GL_ARB_ext").unwrap();
        assert!(api.enums.contains("GL_X"));
        assert!(api.commands.contains("glExt"));
        // the gles2-only block doesn't apply
        assert!(!api.enums.contains("GL_ES_ONLY"));
        assert_eq!(api.extensions(), ["GL_ARB_ext".to_string()]);

        // merging again is harmless
        api.merge_extension(&registry, "GL_ARB_ext").unwrap();
        assert_eq!(api.commands.len(), 3);

        assert!(matches!(
            api.merge_extension(&registry, "GL_OES_ext"),
            Err(ResolveError::ExtensionNotSupported { .. })
        ));
        assert!(matches!(
            api.merge_extension(&registry, "GL_NOPE"),
            Err(ResolveError::UnknownExtension(_))
        ));
    }
}
