//! Build Plan
//!
//! The build plan is the output of the resolver. It is a fully merged and
//! validated snapshot of the configuration of a single variant. No managed
//! versions or override placeholders remain. External build tools consume
//! it in one of the supported representations.

use crate::{catalog, config, signing};

/// Resolved Signing
///
/// The signing identity selected for the variant, including its credential
/// reference.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Signing {
    pub identity: String,
    pub debug: bool,
    pub credential: signing::Credential,
}

/// Build Plan
///
/// Scalar fields come before nested tables, so the plan can be serialized
/// as TOML.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildPlan {
    pub variant: String,
    pub namespace: String,
    pub application_id: String,
    pub version_code: u32,
    pub version_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndk_version: Option<String>,
    pub debuggable: bool,
    pub minify: bool,
    /// Plugin IDs in application order.
    pub plugins: Vec<String>,
    /// Coordinates of all applied BOMs.
    pub platforms: Vec<String>,

    pub sdk: config::Sdk,
    pub java: config::Java,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing: Option<Signing>,
    /// Effective state of every known toggle.
    pub toggles: std::collections::BTreeMap<String, bool>,
    /// Effective selection of every alternative.
    pub alternatives: std::collections::BTreeMap<String, String>,
    pub dependencies: Vec<catalog::ResolvedDependency>,
}

/// Output Errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot serialize build plan as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot serialize build plan as TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

// Append a `key=value` line to a property listing.
fn push_property(acc: &mut String, key: &str, value: &dyn std::fmt::Display) {
    acc.push_str(key);
    acc.push('=');
    acc.push_str(&value.to_string());
    acc.push('\n');
}

impl BuildPlan {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        let mut v = serde_json::to_string_pretty(self)?;
        v.push('\n');
        Ok(v)
    }

    /// Serialize as TOML.
    pub fn to_toml(&self) -> Result<String, Error> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Serialize as Gradle project properties
    ///
    /// Produce one `key=value` line per setting, in a fixed order. The
    /// property names are suitable for `--project-prop` arguments or a
    /// `gradle.properties` file:
    ///
    ///  * `osiris.android.*` carries the Android plugin settings.
    ///  * `osiris.java.*` carries the Java compatibility levels.
    ///  * `osiris.signing.*` carries the signing identity, if any.
    ///  * `osiris.toggle.<name>` carries the state of every toggle.
    ///  * `osiris.platform.<n>` and `osiris.dependency.<n>` list the BOMs
    ///    and dependencies, numbered from zero. Dependencies are written as
    ///    `<configuration> <group>:<artifact>:<version>`.
    pub fn to_properties(&self) -> String {
        let mut acc = String::new();

        acc.push_str("# Generated by osiris-resolver\n");
        push_property(&mut acc, "osiris.variant", &self.variant);

        push_property(&mut acc, "osiris.android.namespace", &self.namespace);
        push_property(&mut acc, "osiris.android.applicationId", &self.application_id);
        push_property(&mut acc, "osiris.android.compileSdk", &self.sdk.compile);
        push_property(&mut acc, "osiris.android.minSdk", &self.sdk.min);
        push_property(&mut acc, "osiris.android.targetSdk", &self.sdk.target);
        push_property(&mut acc, "osiris.android.versionCode", &self.version_code);
        push_property(&mut acc, "osiris.android.versionName", &self.version_name);
        if let Some(v) = &self.ndk_version {
            push_property(&mut acc, "osiris.android.ndkVersion", v);
        }
        push_property(&mut acc, "osiris.android.debuggable", &self.debuggable);
        push_property(&mut acc, "osiris.android.minifyEnabled", &self.minify);

        push_property(&mut acc, "osiris.java.sourceCompatibility", &self.java.source_compatibility);
        push_property(&mut acc, "osiris.java.targetCompatibility", &self.java.target_compatibility);
        push_property(&mut acc, "osiris.java.jvmTarget", &self.java.jvm_target);

        if let Some(v) = &self.signing {
            push_property(&mut acc, "osiris.signing.identity", &v.identity);
        }

        for (name, enabled) in self.toggles.iter() {
            push_property(&mut acc, &format!("osiris.toggle.{}", name), enabled);
        }

        for (i, plugin) in self.plugins.iter().enumerate() {
            push_property(&mut acc, &format!("osiris.plugin.{}", i), plugin);
        }

        for (i, platform) in self.platforms.iter().enumerate() {
            push_property(&mut acc, &format!("osiris.platform.{}", i), platform);
        }

        for (i, dependency) in self.dependencies.iter().enumerate() {
            push_property(
                &mut acc,
                &format!("osiris.dependency.{}", i),
                &format_args!("{} {}", dependency.scope.as_str(), dependency.coordinate()),
            );
        }

        acc
    }
}
