//! Base Configuration
//!
//! The base configuration holds every setting of the application that is
//! not a dependency, a toggle, or a signing identity. Variants override it
//! sparsely. The values map one-to-one to their equivalents in the Android
//! Gradle plugin.

/// SDK Levels
///
/// The Android API levels an application is built against. A valid
/// configuration satisfies `min <= target <= compile`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Sdk {
    pub min: u32,
    pub target: u32,
    pub compile: u32,
}

/// Java Compatibility
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Java {
    pub source_compatibility: String,
    pub target_compatibility: String,
    pub jvm_target: String,
}

/// Build Plugin
///
/// A Gradle plugin applied to the application. `after` lists plugins that
/// must be applied before this one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Plugin {
    pub id: String,
    pub after: Vec<String>,
}

/// Base Configuration
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Base {
    pub namespace: String,
    pub application_id: String,
    pub sdk: Sdk,
    pub ndk_version: Option<String>,
    pub version_code: u32,
    pub version_name: String,
    pub java: Java,
    pub plugins: Vec<Plugin>,
    /// Default signing identity. `None` leaves the build unsigned.
    pub signing: Option<String>,
    pub debuggable: bool,
    pub minify: bool,
}

impl Sdk {
    /// Check `min <= target <= compile`.
    pub fn is_valid(&self) -> bool {
        self.min <= self.target && self.target <= self.compile
    }
}

impl Default for Java {
    fn default() -> Self {
        Self {
            source_compatibility: "1.8".to_string(),
            target_compatibility: "1.8".to_string(),
            jvm_target: "1.8".to_string(),
        }
    }
}

impl Plugin {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            after: Vec::new(),
        }
    }

    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after.push(id.into());
        self
    }
}

/// Verify plugin ordering
///
/// Check that every plugin is listed after all plugins named in its `after`
/// list. A required predecessor that is missing entirely is a violation as
/// well. On failure, the offending `(plugin, predecessor)` pair is returned.
pub fn verify_plugin_order(plugins: &[Plugin]) -> Result<(), (String, String)> {
    for (i, plugin) in plugins.iter().enumerate() {
        for after in plugin.after.iter() {
            if !plugins[..i].iter().any(|v| v.id == *after) {
                return Err((plugin.id.clone(), after.clone()));
            }
        }
    }

    Ok(())
}
