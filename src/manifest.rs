//! Resolver Manifest
//!
//! This is a rust implementation of the Osiris Resolver Manifest Format.
//! Applications use this manifest to declare the build configuration of
//! their Android integration: the base settings, dependencies, BOMs, feature
//! toggles, signing identities and build variants. The manifest is a
//! TOML-formatted file usually called `osiris-resolver.toml`.
//!
//! Parsing happens in two steps. First the document is parsed into `Raw`,
//! which only checks syntactic correctness. Then `Manifest` verifies the
//! content semantically. Finally, `Manifest::load()` turns the verified
//! content into a `Resolver`.

use crate::{catalog, config, op, signing, toggle, variant};

/// Raw Dependency Table
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawDependencyTable {
    pub coordinate: String,
    #[serde(default)]
    pub scope: catalog::Scope,
}

/// Raw Dependency Entry
///
/// A dependency is either written as plain coordinate string, using the
/// default scope, or as table with explicit scope.
#[derive(Clone, Debug)]
pub enum RawDependency {
    Coordinate(String),
    Table(RawDependencyTable),
}

// Dispatch on the TOML value type rather than trying each form in turn, so
// errors in the table form name the offending field.
impl<'de> serde::Deserialize<'de> for RawDependency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = RawDependency;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a dependency coordinate string or table")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(RawDependency::Coordinate(v.to_string()))
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                serde::Deserialize::deserialize(
                    serde::de::value::MapAccessDeserializer::new(map),
                ).map(RawDependency::Table)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Raw Manifest Application Table
///
/// The base configuration of the application. The options in this table
/// are one-to-one mappings of their equivalents in the Android Gradle
/// plugin.
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawApplication {
    pub namespace: Option<String>,
    /// Defaults to the namespace.
    pub application_id: Option<String>,
    pub ndk_version: Option<String>,

    pub version_code: Option<u32>,
    pub version_name: Option<String>,

    /// Name of the default signing identity.
    pub signing: Option<String>,
    pub debuggable: Option<bool>,
    pub minify: Option<bool>,
}

/// Raw Manifest SDK Table
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawSdk {
    pub min: Option<u32>,
    pub target: Option<u32>,
    pub compile: Option<u32>,
}

/// Raw Manifest Java Table
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawJava {
    pub source_compatibility: Option<String>,
    pub target_compatibility: Option<String>,
    pub jvm_target: Option<String>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawPlugin {
    pub id: String,
    #[serde(default)]
    pub after: Vec<String>,
}

/// Raw Manifest BOM Table
///
/// A BOM coordinate with the versions it pins, keyed by `group:artifact`.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawBom {
    pub coordinate: String,
    #[serde(default)]
    pub pins: std::collections::BTreeMap<String, String>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawAlternative {
    pub name: String,
    pub select: String,
    pub options: std::collections::BTreeMap<String, RawDependency>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawToggle {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub requires: Vec<RawDependency>,
}

/// Raw Manifest Signing Table
///
/// Exactly one credential reference must be given: `keystore` with
/// `alias`, `env`, or `external`.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawSigning {
    pub name: String,
    #[serde(default)]
    pub debug: bool,

    pub keystore: Option<String>,
    pub alias: Option<String>,
    pub env: Option<String>,
    pub external: Option<String>,
}

/// Raw Manifest Variant Table
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawVariant {
    pub name: String,

    pub signing: Option<String>,
    #[serde(default)]
    pub toggles: std::collections::BTreeMap<String, bool>,
    #[serde(default)]
    pub alternatives: std::collections::BTreeMap<String, String>,

    pub min_sdk: Option<u32>,
    pub target_sdk: Option<u32>,
    pub compile_sdk: Option<u32>,

    pub version_code: Option<u32>,
    pub version_name: Option<String>,
    pub application_id_suffix: Option<String>,
    pub version_name_suffix: Option<String>,

    pub debuggable: Option<bool>,
    pub minify: Option<bool>,
}

/// Raw Manifest Content
///
/// This type contains the raw manifest content as parsed by `toml` and
/// converted into rust types via `serde`.
///
/// Note that content of the type is not verified other than for syntactic
/// correctness required by the given types. Semantic correctness needs to
/// be verified by the caller.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Raw {
    /// Version of the manifest format. Only version `1` is currently
    /// supported.
    pub version: u32,

    #[serde(default)]
    pub application: RawApplication,
    #[serde(default)]
    pub sdk: RawSdk,
    #[serde(default)]
    pub java: RawJava,

    #[serde(default)]
    pub plugin: Vec<RawPlugin>,
    #[serde(default)]
    pub bom: Vec<RawBom>,
    #[serde(default)]
    pub dependency: Vec<RawDependency>,
    #[serde(default)]
    pub alternative: Vec<RawAlternative>,
    #[serde(default)]
    pub toggle: Vec<RawToggle>,
    #[serde(default)]
    pub signing: Vec<RawSigning>,
    #[serde(default)]
    pub variant: Vec<RawVariant>,
}

/// Manifest Errors
///
/// This is the exhaustive list of errors raised while parsing, verifying,
/// or loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The manifest file cannot be read.
    #[error("cannot read manifest: {0}")]
    Io(#[from] std::io::Error),
    /// The manifest is not valid TOML or does not match the format.
    #[error("cannot parse manifest: {0}")]
    Syntax(#[from] toml::de::Error),
    /// The manifest format version is not supported.
    #[error("unsupported manifest version {0}")]
    Version(u32),
    /// Specified key required but missing in manifest.
    #[error("manifest configuration missing '{0}'")]
    MissingKey(&'static str),
    /// The value of the given key is invalid.
    #[error("invalid manifest value for '{key}': {reason}")]
    Invalid {
        key: String,
        reason: &'static str,
    },
    /// A dependency coordinate cannot be parsed.
    #[error(transparent)]
    Coordinate(#[from] catalog::ParseError),
    /// A variant is defined more than once.
    #[error("variant '{0}' is defined more than once")]
    DuplicateVariant(String),
    /// A signing identity is defined more than once.
    #[error("signing identity '{0}' is defined more than once")]
    DuplicateSigning(String),
    /// A toggle is declared more than once.
    #[error("toggle '{0}' is declared more than once")]
    DuplicateToggle(String),
}

/// Manifest Abstraction
///
/// This type represents a valid and verified manifest. The manifest content
/// can be directly accessed via the `raw` field. The data is verified for
/// semantic correctness (unlike the `Raw` type).
#[derive(Clone, Debug)]
pub struct Manifest {
    /// Raw manifest content as parsed by the TOML module.
    pub raw: Raw,
}

impl RawDependency {
    /// Parse the entry into a coordinate.
    pub fn coordinate(&self) -> Result<catalog::Coordinate, catalog::ParseError> {
        match self {
            RawDependency::Coordinate(v) => v.parse(),
            RawDependency::Table(v) => {
                v.coordinate.parse::<catalog::Coordinate>()
                    .map(|c| c.with_scope(v.scope))
            },
        }
    }
}

impl RawSigning {
    /// Return the credential reference
    ///
    /// Return the single credential reference of this identity, or `None`
    /// if none or more than one reference is given.
    pub fn credential(&self) -> Option<signing::Credential> {
        match (&self.keystore, &self.alias, &self.env, &self.external) {
            (Some(path), Some(alias), None, None) => Some(signing::Credential::Keystore {
                path: path.clone(),
                alias: alias.clone(),
            }),
            (None, None, Some(v), None) => Some(signing::Credential::Env {
                variable: v.clone(),
            }),
            (None, None, None, Some(v)) => Some(signing::Credential::External {
                reference: v.clone(),
            }),
            _ => None,
        }
    }
}

impl RawVariant {
    /// Return the overrides of this variant.
    pub fn overrides(&self) -> variant::Overrides {
        variant::Overrides {
            signing: self.signing.clone(),
            toggles: self.toggles.clone(),
            alternatives: self.alternatives.clone(),
            min_sdk: self.min_sdk,
            target_sdk: self.target_sdk,
            compile_sdk: self.compile_sdk,
            version_code: self.version_code,
            version_name: self.version_name.clone(),
            application_id_suffix: self.application_id_suffix.clone(),
            version_name_suffix: self.version_name_suffix.clone(),
            debuggable: self.debuggable,
            minify: self.minify,
        }
    }
}

impl Raw {
    fn parse_str(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    /// Find the variant entry with the given name.
    pub fn variant_by_name(&self, name: &str) -> Option<&RawVariant> {
        self.variant.iter().find(
            |v| v.name == name
        )
    }
}

impl Manifest {
    // Check whether a string is a valid identifier
    //
    // This verifies that the given string consists of only ASCII
    // alphanumeric characters plus `-`, `_`. Empty identifiers are rejected.
    // Identifiers end up in Gradle property names, so no other characters
    // are allowed.
    fn is_identifier(s: &str) -> bool {
        !s.is_empty() && s.chars().all(
            |v| v.is_ascii_alphanumeric() || v == '-' || v == '_'
        )
    }

    // Check whether a string contains no quotes or escapes
    //
    // This verifies that a string does not contain quotes or backslashes, nor
    // any control characters. Such strings can be interpolated into Gradle
    // properties and build scripts without escaping.
    fn is_quotable(s: &str) -> bool {
        s.chars().all(
            |v| !v.is_control()
                && v != '\\'
                && v != '\''
                && v != '"'
        )
    }

    fn verify_identifier(key: impl FnOnce() -> String, s: &str) -> Result<(), Error> {
        if Self::is_identifier(s) {
            Ok(())
        } else {
            Err(Error::Invalid { key: key(), reason: "not a valid identifier" })
        }
    }

    fn verify_quotable(key: &str, s: Option<&String>) -> Result<(), Error> {
        match s {
            Some(v) if !Self::is_quotable(v) => Err(Error::Invalid {
                key: key.to_string(),
                reason: "must not contain quotes, backslashes or control characters",
            }),
            _ => Ok(()),
        }
    }

    /// Parse manifest from raw
    ///
    /// Take a raw representation of the manifest and perform post-parsing
    /// validation, ensuring the final manifest will not contain invalid
    /// entries.
    fn parse_raw(raw: Raw) -> Result<Self, Error> {
        // We only support version '1'. Any other version number is explicitly
        // defined to be incompatible, so fail parsing.
        //
        // Note that we do support unknown-fields. Hence, it is valid to add
        // more fields to version '1' without breaking backwards compatibility.
        // However, they will be silently ignored by older implementations.
        if raw.version != 1 {
            return Err(Error::Version(raw.version));
        }

        // Ensure all strings that end up in Gradle configuration can be put
        // in quotes.
        Self::verify_quotable("application.namespace", raw.application.namespace.as_ref())?;
        Self::verify_quotable("application.application-id", raw.application.application_id.as_ref())?;
        Self::verify_quotable("application.version-name", raw.application.version_name.as_ref())?;
        Self::verify_quotable("application.ndk-version", raw.application.ndk_version.as_ref())?;

        for v in raw.plugin.iter() {
            Self::verify_quotable("plugin.id", Some(&v.id))?;
            if v.id.is_empty() {
                return Err(Error::Invalid { key: "plugin.id".to_string(), reason: "must not be empty" });
            }
        }

        for v in raw.alternative.iter() {
            Self::verify_identifier(|| "alternative.name".to_string(), &v.name)?;
            for name in v.options.keys() {
                Self::verify_identifier(|| format!("alternative.{}.options", v.name), name)?;
            }
        }

        for v in raw.toggle.iter() {
            Self::verify_identifier(|| "toggle.name".to_string(), &v.name)?;
        }

        for v in raw.signing.iter() {
            Self::verify_identifier(|| "signing.name".to_string(), &v.name)?;
            if v.credential().is_none() {
                return Err(Error::Invalid {
                    key: format!("signing.{}", v.name),
                    reason: "requires exactly one of 'keystore' with 'alias', 'env', or 'external'",
                });
            }
        }

        for v in raw.variant.iter() {
            Self::verify_identifier(|| "variant.name".to_string(), &v.name)?;
            Self::verify_quotable("variant.version-name", v.version_name.as_ref())?;
            Self::verify_quotable("variant.application-id-suffix", v.application_id_suffix.as_ref())?;
            Self::verify_quotable("variant.version-name-suffix", v.version_name_suffix.as_ref())?;
        }

        Ok(
            Self {
                raw: raw,
            }
        )
    }

    /// Parse manifest from string
    ///
    /// Parse the given string as a literal manifest in TOML representation.
    /// Content is verified and invalid manifests are refused.
    pub fn parse_str(content: &str) -> Result<Self, Error> {
        Raw::parse_str(content).and_then(Self::parse_raw)
    }

    /// Parse manifest from file-system
    ///
    /// Open the specified file and parse it as a manifest. The content is
    /// verified and invalid manifests are refused. The file is completely
    /// parsed into memory and then closed again before the function returns.
    pub fn parse_path(path: &std::path::Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Build the base configuration
    ///
    /// Fails with `Error::MissingKey` if a required key is not set. The
    /// application ID defaults to the namespace, the Java levels default
    /// to `1.8`.
    pub fn base(&self) -> Result<config::Base, Error> {
        let application = &self.raw.application;
        let sdk = &self.raw.sdk;
        let java = &self.raw.java;
        let java_default = config::Java::default();

        let namespace = application.namespace.clone()
            .ok_or(Error::MissingKey("application.namespace"))?;

        Ok(config::Base {
            application_id: application.application_id.clone()
                .unwrap_or_else(|| namespace.clone()),
            namespace: namespace,
            sdk: config::Sdk {
                min: sdk.min.ok_or(Error::MissingKey("sdk.min"))?,
                target: sdk.target.ok_or(Error::MissingKey("sdk.target"))?,
                compile: sdk.compile.ok_or(Error::MissingKey("sdk.compile"))?,
            },
            ndk_version: application.ndk_version.clone(),
            version_code: application.version_code
                .ok_or(Error::MissingKey("application.version-code"))?,
            version_name: application.version_name.clone()
                .ok_or(Error::MissingKey("application.version-name"))?,
            java: config::Java {
                source_compatibility: java.source_compatibility.clone()
                    .unwrap_or(java_default.source_compatibility),
                target_compatibility: java.target_compatibility.clone()
                    .unwrap_or(java_default.target_compatibility),
                jvm_target: java.jvm_target.clone()
                    .unwrap_or(java_default.jvm_target),
            },
            plugins: self.raw.plugin.iter().map(|v| config::Plugin {
                id: v.id.clone(),
                after: v.after.clone(),
            }).collect(),
            signing: application.signing.clone(),
            debuggable: application.debuggable.unwrap_or(false),
            minify: application.minify.unwrap_or(false),
        })
    }

    /// Build the dependency catalog.
    pub fn catalog(&self) -> Result<catalog::Catalog, Error> {
        let mut catalog = catalog::Catalog::new();

        for bom in self.raw.bom.iter() {
            let coordinate: catalog::Coordinate = bom.coordinate.parse()?;
            let catalog::Version::Explicit(version) = coordinate.version else {
                return Err(Error::Invalid {
                    key: format!("bom.{}", bom.coordinate),
                    reason: "a bill-of-materials requires an explicit version",
                });
            };

            let pins = bom.pins.iter()
                .map(|(k, v)| -> Result<_, Error> {
                    if v.is_empty() || v.contains(|c: char| c.is_whitespace() || c == ':') {
                        return Err(Error::Invalid {
                            key: format!("bom.{}.pins", bom.coordinate),
                            reason: "pinned versions must be non-empty and free of whitespace or ':'",
                        });
                    }
                    Ok((k.parse::<catalog::Key>()?, v.clone()))
                })
                .collect::<Result<Vec<_>, Error>>()?;

            catalog.add_bom(catalog::Bom::new(coordinate.key, version, pins));
        }

        for dependency in self.raw.dependency.iter() {
            catalog.add_dependency(dependency.coordinate()?);
        }

        for alternative in self.raw.alternative.iter() {
            let options = alternative.options.iter()
                .map(|(k, v)| -> Result<_, Error> {
                    Ok((k.clone(), v.coordinate()?))
                })
                .collect::<Result<Vec<_>, Error>>()?;

            let v = catalog::Alternative::new(
                alternative.name.as_str(),
                alternative.select.as_str(),
                options,
            ).map_err(|_| Error::Invalid {
                key: format!("alternative.{}.select", alternative.name),
                reason: "does not name one of the options",
            })?;

            catalog.add_alternative(v);
        }

        Ok(catalog)
    }

    /// Build the feature toggle set.
    pub fn toggles(&self) -> Result<toggle::ToggleSet, Error> {
        let mut toggles = toggle::ToggleSet::new();

        for v in self.raw.toggle.iter() {
            if toggles.is_declared(&v.name) {
                return Err(Error::DuplicateToggle(v.name.clone()));
            }

            let mut t = toggle::Toggle::new(v.name.as_str(), v.enabled);
            for r in v.requires.iter() {
                t = t.requiring(r.coordinate()?);
            }
            toggles.declare(t);
        }

        Ok(toggles)
    }

    /// Build the signing identity registry.
    pub fn signing(&self) -> Result<signing::Registry, Error> {
        let mut registry = signing::Registry::new();

        for v in self.raw.signing.iter() {
            let credential = v.credential().ok_or_else(|| Error::Invalid {
                key: format!("signing.{}", v.name),
                reason: "requires exactly one of 'keystore' with 'alias', 'env', or 'external'",
            })?;

            registry.register(signing::SigningIdentity {
                name: v.name.clone(),
                credential: credential,
                debug: v.debug,
            }).map_err(|_| Error::DuplicateSigning(v.name.clone()))?;
        }

        Ok(registry)
    }

    /// Build the variant definition table.
    pub fn variants(&self) -> Result<variant::VariantTable, Error> {
        let mut variants = variant::VariantTable::new();

        for v in self.raw.variant.iter() {
            variants.define_variant(v.name.as_str(), v.overrides())
                .map_err(|_| Error::DuplicateVariant(v.name.clone()))?;
        }

        Ok(variants)
    }

    /// Load the manifest into a resolver
    ///
    /// Build all registries from the manifest content. This is the one-time
    /// load phase. The returned resolver is immutable.
    pub fn load(&self) -> Result<op::resolve::Resolver, Error> {
        let resolver = op::resolve::Resolver::new(
            self.base()?,
            self.catalog()?,
            self.toggles()?,
            self.variants()?,
            self.signing()?,
        );

        tracing::debug!(
            variants = resolver.variants().len(),
            dependencies = resolver.catalog().dependencies().len(),
            boms = resolver.catalog().boms().len(),
            "loaded manifest",
        );

        Ok(resolver)
    }
}
