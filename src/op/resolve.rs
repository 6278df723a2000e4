//! Variant Resolution
//!
//! The `resolve` operation merges the base configuration, the overrides of
//! one variant, the feature toggles, the dependency catalog and the signing
//! registry into a single build plan. Resolution is a pure function of the
//! loaded state. It never modifies the shared registries, so multiple
//! variants can be resolved concurrently from the same resolver.
//!
//! Resolution is all-or-nothing. Every failure is an authoring error in the
//! declarative input and is reported as is, without retries or fallbacks.

use crate::{catalog, config, plan, signing, toggle, variant};

/// Resolution Errors
///
/// This is the exhaustive list of possible errors raised by the resolve
/// operation. See each error for details.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The requested variant is not defined.
    #[error("unknown variant '{0}'")]
    UnknownVariant(String),
    /// The variant references a signing identity that is not registered.
    #[error("variant '{variant}' references unknown signing identity '{identity}'")]
    UnknownSigningIdentity {
        variant: String,
        identity: String,
    },
    /// A managed dependency is not pinned by any BOM.
    #[error("managed dependency '{0}' is not pinned by any bill-of-materials")]
    UnresolvedManagedVersion(catalog::Key),
    /// A dependency is declared with conflicting explicit versions.
    #[error("dependency '{key}' is declared with conflicting versions '{first}' and '{second}'")]
    DuplicateCoordinate {
        key: catalog::Key,
        first: String,
        second: String,
    },
    /// An alternative selection names an unknown alternative or option.
    #[error("alternative '{alternative}' has no option '{option}'")]
    UnknownAlternative {
        alternative: String,
        option: String,
    },
    /// The effective SDK levels violate `min <= target <= compile`.
    #[error("variant '{variant}' has invalid SDK range: min {min}, target {target}, compile {compile}")]
    InvalidSdkRange {
        variant: String,
        min: u32,
        target: u32,
        compile: u32,
    },
    /// A plugin is applied before a plugin it must follow.
    #[error("plugin '{plugin}' must be applied after '{after}'")]
    PluginOrder {
        plugin: String,
        after: String,
    },
}

impl From<catalog::Error> for Error {
    fn from(error: catalog::Error) -> Self {
        match error {
            catalog::Error::UnresolvedManagedVersion(key) => {
                Self::UnresolvedManagedVersion(key)
            },
            catalog::Error::DuplicateCoordinate { key, first, second } => {
                Self::DuplicateCoordinate { key, first, second }
            },
            catalog::Error::UnknownAlternative { alternative, option } => {
                Self::UnknownAlternative { alternative, option }
            },
        }
    }
}

/// Configuration Resolver
///
/// Holds the loaded, immutable configuration state and resolves build plans
/// for its variants.
#[derive(Clone, Debug)]
pub struct Resolver {
    base: config::Base,
    catalog: catalog::Catalog,
    toggles: toggle::ToggleSet,
    variants: variant::VariantTable,
    signing: signing::Registry,
}

impl Resolver {
    pub fn new(
        base: config::Base,
        catalog: catalog::Catalog,
        toggles: toggle::ToggleSet,
        variants: variant::VariantTable,
        signing: signing::Registry,
    ) -> Self {
        Self {
            base: base,
            catalog: catalog,
            toggles: toggles,
            variants: variants,
            signing: signing,
        }
    }

    pub fn base(&self) -> &config::Base {
        &self.base
    }

    pub fn catalog(&self) -> &catalog::Catalog {
        &self.catalog
    }

    pub fn toggles(&self) -> &toggle::ToggleSet {
        &self.toggles
    }

    pub fn variants(&self) -> &variant::VariantTable {
        &self.variants
    }

    pub fn signing(&self) -> &signing::Registry {
        &self.signing
    }

    /// Resolve a variant
    ///
    /// Produce the build plan of the named variant. The variant overrides
    /// are merged over the base configuration field by field, the toggle
    /// requirements are merged into a private copy of the catalog, and the
    /// result is validated before it is returned.
    pub fn resolve(&self, name: &str) -> Result<plan::BuildPlan, Error> {
        let variant = self.variants.get_variant(name).map_err(
            |variant::UnknownVariant(v)| Error::UnknownVariant(v),
        )?;
        let overrides = &variant.overrides;

        tracing::debug!(variant = name, "resolving variant");

        // Merge toggles and collect their requirements into a working copy
        // of the catalog. The shared catalog is never touched.
        let toggles = self.toggles.with_overrides(&overrides.toggles);
        let required = toggles.required_dependencies_for(toggles.enabled());
        let mut working = self.catalog.clone();
        for coordinate in required {
            tracing::debug!(variant = name, %coordinate, "toggle requires dependency");
            working.add_dependency(coordinate);
        }

        let dependencies = working.resolve_with(&overrides.alternatives)?;
        tracing::debug!(variant = name, count = dependencies.len(), "resolved dependencies");

        // Resolve the signing reference eagerly, so a missing identity is
        // reported now rather than at packaging time.
        let debuggable = overrides.debuggable.unwrap_or(self.base.debuggable);
        let signing = match overrides.signing.as_ref().or(self.base.signing.as_ref()) {
            None => None,
            Some(identity) => {
                let v = self.signing.lookup(identity).map_err(
                    |_| Error::UnknownSigningIdentity {
                        variant: name.to_string(),
                        identity: identity.clone(),
                    },
                )?;

                if v.debug && !debuggable {
                    tracing::warn!(
                        variant = name,
                        identity = v.name.as_str(),
                        "non-debuggable variant is signed with a debug identity",
                    );
                }

                Some(plan::Signing {
                    identity: v.name.clone(),
                    debug: v.debug,
                    credential: v.credential.clone(),
                })
            },
        };

        let sdk = config::Sdk {
            min: overrides.min_sdk.unwrap_or(self.base.sdk.min),
            target: overrides.target_sdk.unwrap_or(self.base.sdk.target),
            compile: overrides.compile_sdk.unwrap_or(self.base.sdk.compile),
        };
        if !sdk.is_valid() {
            return Err(Error::InvalidSdkRange {
                variant: name.to_string(),
                min: sdk.min,
                target: sdk.target,
                compile: sdk.compile,
            });
        }

        config::verify_plugin_order(&self.base.plugins).map_err(
            |(plugin, after)| Error::PluginOrder { plugin, after },
        )?;

        let mut application_id = self.base.application_id.clone();
        if let Some(v) = &overrides.application_id_suffix {
            application_id.push_str(v);
        }

        let mut version_name = overrides.version_name.clone()
            .unwrap_or_else(|| self.base.version_name.clone());
        if let Some(v) = &overrides.version_name_suffix {
            version_name.push_str(v);
        }

        let alternatives = working.alternatives().iter().map(|v| {
            let selected = overrides.alternatives.get(&v.name).unwrap_or(&v.selected);
            (v.name.clone(), selected.clone())
        }).collect();

        Ok(plan::BuildPlan {
            variant: variant.name.clone(),
            namespace: self.base.namespace.clone(),
            application_id: application_id,
            version_code: overrides.version_code.unwrap_or(self.base.version_code),
            version_name: version_name,
            ndk_version: self.base.ndk_version.clone(),
            debuggable: debuggable,
            minify: overrides.minify.unwrap_or(self.base.minify),
            plugins: self.base.plugins.iter().map(|v| v.id.clone()).collect(),
            platforms: working.boms().iter().map(catalog::Bom::coordinate).collect(),

            sdk: sdk,
            java: self.base.java.clone(),
            signing: signing,
            toggles: toggles.states(),
            alternatives: alternatives,
            dependencies: dependencies,
        })
    }

    /// Resolve all variants
    ///
    /// Resolve every defined variant in definition order and return each
    /// result. A failing variant does not stop resolution of the others.
    pub fn resolve_all(&self) -> Vec<(String, Result<plan::BuildPlan, Error>)> {
        self.variants.names()
            .map(|v| (v.to_string(), self.resolve(v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> config::Base {
        config::Base {
            namespace: "com.example.leadassist".to_string(),
            application_id: "com.example.leadassist".to_string(),
            sdk: config::Sdk { min: 23, target: 34, compile: 36 },
            ndk_version: Some("27.0.12077973".to_string()),
            version_code: 1,
            version_name: "1.0.0".to_string(),
            java: config::Java::default(),
            plugins: vec![
                config::Plugin::new("com.android.application"),
                config::Plugin::new("kotlin-android"),
                config::Plugin::new("dev.flutter.flutter-gradle-plugin")
                    .after("com.android.application")
                    .after("kotlin-android"),
            ],
            signing: Some("debug".to_string()),
            debuggable: false,
            minify: false,
        }
    }

    fn catalog() -> catalog::Catalog {
        let mut v = catalog::Catalog::new();
        v.add_bom(catalog::Bom::new(
            catalog::Key::new("com.google.firebase", "firebase-bom"),
            "34.4.0",
            [
                (catalog::Key::new("com.google.firebase", "firebase-auth"), "34.4.0".to_string()),
                (catalog::Key::new("com.google.firebase", "firebase-analytics"), "23.0.0".to_string()),
            ],
        ));
        v.add_dependency(catalog::Coordinate::explicit(
            "com.google.android.gms", "play-services-safetynet", "18.1.0",
        ));
        v.add_dependency(catalog::Coordinate::managed("com.google.firebase", "firebase-auth"));
        v.add_dependency(catalog::Coordinate::managed("com.google.firebase", "firebase-analytics"));
        v
    }

    fn toggles() -> toggle::ToggleSet {
        let mut v = toggle::ToggleSet::new();
        v.declare(toggle::Toggle::new("desugaring", true).requiring(
            catalog::Coordinate::explicit("com.android.tools", "desugar_jdk_libs", "2.1.5")
                .with_scope(catalog::Scope::CoreLibraryDesugaring),
        ));
        v.declare(toggle::Toggle::new("multidex", true).requiring(
            catalog::Coordinate::explicit("androidx.multidex", "multidex", "2.0.1"),
        ));
        v
    }

    fn signing() -> signing::Registry {
        let mut v = signing::Registry::new();
        v.register(signing::SigningIdentity {
            name: "debug".to_string(),
            credential: signing::Credential::Keystore {
                path: "~/.android/debug.keystore".to_string(),
                alias: "androiddebugkey".to_string(),
            },
            debug: true,
        }).unwrap();
        v
    }

    fn variants(release: variant::Overrides) -> variant::VariantTable {
        let mut v = variant::VariantTable::new();
        v.define_variant("debug", variant::Overrides {
            debuggable: Some(true),
            application_id_suffix: Some(".debug".to_string()),
            ..Default::default()
        }).unwrap();
        v.define_variant("release", release).unwrap();
        v
    }

    fn resolver(release: variant::Overrides) -> Resolver {
        Resolver::new(base(), catalog(), toggles(), variants(release), signing())
    }

    // Verify the managed firebase coordinate is pinned by the BOM in every
    // variant, and toggle requirements are part of the plan.
    #[test]
    fn resolve_bom_scenario() {
        let r = resolver(Default::default());

        for (name, plan) in r.resolve_all() {
            let plan = plan.unwrap();
            let coordinates: Vec<String> = plan.dependencies.iter()
                .map(catalog::ResolvedDependency::coordinate)
                .collect();

            assert_eq!(plan.variant, name);
            assert!(coordinates.contains(&"com.google.firebase:firebase-auth:34.4.0".to_string()));
            assert!(coordinates.contains(&"com.android.tools:desugar_jdk_libs:2.1.5".to_string()));
            assert!(coordinates.contains(&"androidx.multidex:multidex:2.0.1".to_string()));
            assert_eq!(plan.platforms, ["com.google.firebase:firebase-bom:34.4.0"]);
        }
    }

    // Verify base and overrides are merged field by field
    #[test]
    fn resolve_merge() {
        let r = resolver(variant::Overrides {
            target_sdk: Some(34),
            compile_sdk: Some(36),
            version_code: Some(7),
            version_name_suffix: Some("-rc".to_string()),
            minify: Some(true),
            ..Default::default()
        });

        let debug = r.resolve("debug").unwrap();
        assert_eq!(debug.application_id, "com.example.leadassist.debug");
        assert!(debug.debuggable);
        assert!(!debug.minify);
        assert_eq!(debug.version_code, 1);
        assert_eq!(debug.signing.as_ref().unwrap().identity, "debug");

        let release = r.resolve("release").unwrap();
        assert_eq!(release.application_id, "com.example.leadassist");
        assert_eq!(release.sdk, config::Sdk { min: 23, target: 34, compile: 36 });
        assert_eq!(release.version_code, 7);
        assert_eq!(release.version_name, "1.0.0-rc");
        assert!(release.minify);
        assert!(!release.debuggable);
        assert_eq!(release.plugins.len(), 3);
    }

    #[test]
    fn resolve_unknown_variant() {
        let r = resolver(Default::default());

        assert_eq!(
            r.resolve("staging").unwrap_err(),
            Error::UnknownVariant("staging".to_string()),
        );
    }

    // A signing identity missing from the registry fails resolution of the
    // referencing variant only.
    #[test]
    fn resolve_unknown_signing() {
        let r = resolver(variant::Overrides {
            signing: Some("prod-signing".to_string()),
            ..Default::default()
        });

        assert_eq!(
            r.resolve("release").unwrap_err(),
            Error::UnknownSigningIdentity {
                variant: "release".to_string(),
                identity: "prod-signing".to_string(),
            },
        );
        assert!(r.resolve("debug").is_ok());
    }

    #[test]
    fn resolve_invalid_sdk() {
        let r = resolver(variant::Overrides {
            min_sdk: Some(35),
            ..Default::default()
        });

        assert_eq!(
            r.resolve("release").unwrap_err(),
            Error::InvalidSdkRange {
                variant: "release".to_string(),
                min: 35,
                target: 34,
                compile: 36,
            },
        );
    }

    #[test]
    fn resolve_unresolved_managed() {
        let mut c = catalog();
        c.add_dependency(catalog::Coordinate::managed("com.google.firebase", "firebase-firestore"));
        let r = Resolver::new(base(), c, toggles(), variants(Default::default()), signing());

        assert_eq!(
            r.resolve("debug").unwrap_err(),
            Error::UnresolvedManagedVersion(
                catalog::Key::new("com.google.firebase", "firebase-firestore"),
            ),
        );
    }

    // An explicit catalog entry conflicting with a toggle requirement is a
    // duplicate, but only while the toggle is enabled.
    #[test]
    fn resolve_toggle_conflict() {
        let mut c = catalog();
        c.add_dependency(catalog::Coordinate::explicit("androidx.multidex", "multidex", "2.0.0"));
        let mut release = variant::Overrides::default();
        release.toggles.insert("multidex".to_string(), false);
        let r = Resolver::new(base(), c, toggles(), variants(release), signing());

        assert!(matches!(r.resolve("debug"), Err(Error::DuplicateCoordinate { .. })));

        let plan = r.resolve("release").unwrap();
        let multidex = plan.dependencies.iter()
            .find(|v| v.artifact == "multidex")
            .unwrap();
        assert_eq!(multidex.version, "2.0.0");
    }

    // Toggling a feature in `release` must not affect other variants, nor
    // the shared state.
    #[test]
    fn resolve_independent_variants() {
        let mut release = variant::Overrides::default();
        release.toggles.insert("desugaring".to_string(), false);
        let r = resolver(release);

        let release = r.resolve("release").unwrap();
        let debug = r.resolve("debug").unwrap();

        assert_eq!(release.toggles.get("desugaring"), Some(&false));
        assert_eq!(debug.toggles.get("desugaring"), Some(&true));
        assert!(release.dependencies.iter().all(|v| v.artifact != "desugar_jdk_libs"));
        assert!(debug.dependencies.iter().any(|v| v.artifact == "desugar_jdk_libs"));
        assert!(r.toggles().is_enabled("desugaring"));
        assert_eq!(r.catalog().dependencies().len(), 3);
    }

    // A variant selecting another option of an alternative gets that option,
    // while other variants keep the default selection.
    #[test]
    fn resolve_alternative_override() {
        let mut c = catalog();
        c.add_bom(catalog::Bom::new(
            catalog::Key::new("com.google.firebase", "firebase-bom"),
            "34.4.0",
            [
                (catalog::Key::new("com.google.firebase", "firebase-auth-ktx"), "23.2.1".to_string()),
            ],
        ));
        c.add_alternative(catalog::Alternative::new(
            "firebase-ui",
            "standard",
            [
                ("standard".to_string(), catalog::Coordinate::explicit("com.firebaseui", "firebase-ui-auth", "9.0.0")),
                ("ktx".to_string(), catalog::Coordinate::managed("com.google.firebase", "firebase-auth-ktx")),
            ],
        ).unwrap());

        let mut release = variant::Overrides::default();
        release.alternatives.insert("firebase-ui".to_string(), "ktx".to_string());
        let r = Resolver::new(base(), c.clone(), toggles(), variants(release), signing());

        let release = r.resolve("release").unwrap();
        assert_eq!(release.alternatives.get("firebase-ui").map(String::as_str), Some("ktx"));
        assert!(release.dependencies.iter().any(|v| v.artifact == "firebase-auth-ktx" && v.version == "23.2.1"));
        assert!(release.dependencies.iter().all(|v| v.artifact != "firebase-ui-auth"));

        let debug = r.resolve("debug").unwrap();
        assert_eq!(debug.alternatives.get("firebase-ui").map(String::as_str), Some("standard"));
        assert!(debug.dependencies.iter().any(|v| v.artifact == "firebase-ui-auth"));
        assert!(debug.dependencies.iter().all(|v| v.artifact != "firebase-auth-ktx"));

        let mut legacy = variant::Overrides::default();
        legacy.alternatives.insert("firebase-ui".to_string(), "legacy".to_string());
        let r = Resolver::new(base(), c, toggles(), variants(legacy), signing());
        assert_eq!(
            r.resolve("release").unwrap_err(),
            Error::UnknownAlternative {
                alternative: "firebase-ui".to_string(),
                option: "legacy".to_string(),
            },
        );
    }

    #[test]
    fn resolve_deterministic() {
        let r = resolver(Default::default());

        assert_eq!(r.resolve("release").unwrap(), r.resolve("release").unwrap());
    }

    #[test]
    fn resolve_plugin_order() {
        let mut b = base();
        b.plugins.swap(1, 2);
        let r = Resolver::new(b, catalog(), toggles(), variants(Default::default()), signing());

        assert_eq!(
            r.resolve("debug").unwrap_err(),
            Error::PluginOrder {
                plugin: "dev.flutter.flutter-gradle-plugin".to_string(),
                after: "kotlin-android".to_string(),
            },
        );
    }

    // Resolution of distinct variants from multiple threads yields the same
    // plans as sequential resolution.
    #[test]
    fn resolve_concurrent() {
        let r = resolver(variant::Overrides {
            version_code: Some(2),
            ..Default::default()
        });
        let sequential = r.resolve_all();

        let concurrent: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = ["debug", "release"].into_iter()
                .map(|v| {
                    let r = &r;
                    s.spawn(move || (v.to_string(), r.resolve(v)))
                })
                .collect();
            handles.into_iter().map(|v| v.join().unwrap()).collect()
        });

        assert_eq!(sequential, concurrent);
    }
}
