//! Build Plan Emission
//!
//! The `emit` operation renders a build plan in one of the supported output
//! formats and either returns it, or stores it persistently on disk. When
//! writing to disk, the file is only modified if its content changes, so
//! external build tools do not see spurious timestamp updates.

use crate::plan;

/// Output Format
///
/// This enum is an enumeration of supported output formats. It implements
/// `FromStr` to allow creation from string representation. Use `as_str()`
/// to get a static string-representation back.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Format {
    #[default]
    Json,
    Toml,
    Properties,
}

/// Emit Errors
///
/// This is the exhaustive list of possible errors raised by the emit
/// operation. See each error for details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rendering the plan in the requested format failed.
    #[error(transparent)]
    Render(#[from] plan::Error),
    /// Creation of the directory at the specified path failed.
    #[error("cannot create directory {0:?}: {1}")]
    DirectoryCreation(std::ffi::OsString, std::io::Error),
    /// Updating the file at the specified path failed with the given error.
    #[error("cannot update {0:?}: {1}")]
    FileUpdate(std::ffi::OsString, std::io::Error),
}

impl Format {
    /// Get string representation
    ///
    /// Return the string representation of the format. This is guaranteed to
    /// be parsable by the `FromStr` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Toml => "toml",
            Format::Properties => "properties",
        }
    }
}

// Parse formats from strings
//
// This implements `FromStr` to allow using `std::str::parse()` and thus
// get formats from their respective string representation. Note that this
// uses case-insensitive matching.
impl std::str::FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Format::Json, Format::Toml, Format::Properties]
            .into_iter()
            .find(|v| s.eq_ignore_ascii_case(v.as_str()))
            .ok_or(())
    }
}

// Update a file if required
//
// This writes the given content to the specified file, but only if the file
// content does not already match the new content. This avoids modifying a file
// unless necessary. Thus, the file timestamp is only modified if the content
// really changed.
//
// Note that this reads in the entire file content. Thus, use it only on
// trusted content.
fn update_file(
    path: &std::path::Path,
    content: &str,
) -> Result<bool, Error> {
    let map = |v| Error::FileUpdate(path.as_os_str().to_os_string(), v);

    let mut f = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(map)?;

    let mut old = String::new();
    <std::fs::File as std::io::Read>::read_to_string(&mut f, &mut old)
        .map_err(map)?;

    if old == content {
        return Ok(false);
    }

    // Rewind, truncate and write the new content, then sync to catch
    // errors now rather than on close.
    <std::fs::File as std::io::Seek>::rewind(&mut f).map_err(map)?;
    f.set_len(0).map_err(map)?;
    <std::fs::File as std::io::Write>::write_all(&mut f, content.as_bytes())
        .map_err(map)?;
    f.sync_all().map_err(map)?;

    Ok(true)
}

/// Render a build plan
///
/// Render the plan in the given format and return the result.
pub fn render(
    plan: &plan::BuildPlan,
    format: Format,
) -> Result<String, Error> {
    match format {
        Format::Json => Ok(plan.to_json()?),
        Format::Toml => Ok(plan.to_toml()?),
        Format::Properties => Ok(plan.to_properties()),
    }
}

/// Emit a build plan to persistent storage
///
/// Render the plan in the given format and write it to `path`. Parent
/// directories are created as needed. The file is only written if its
/// content differs. Returns whether the file was modified.
pub fn emit(
    plan: &plan::BuildPlan,
    format: Format,
    path: &std::path::Path,
) -> Result<bool, Error> {
    let content = render(plan, format)?;

    if let Some(parent) = path.parent().filter(|v| !v.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(
            |v| Error::DirectoryCreation(parent.as_os_str().to_os_string(), v),
        )?;
    }

    let modified = update_file(path, &content)?;
    tracing::debug!(path = ?path, modified, format = format.as_str(), "emitted build plan");

    Ok(modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog, config};

    fn plan() -> plan::BuildPlan {
        plan::BuildPlan {
            variant: "release".to_string(),
            namespace: "com.example.leadassist".to_string(),
            application_id: "com.example.leadassist".to_string(),
            version_code: 1,
            version_name: "1.0.0".to_string(),
            ndk_version: None,
            debuggable: false,
            minify: false,
            plugins: vec!["com.android.application".to_string()],
            platforms: vec!["com.google.firebase:firebase-bom:34.4.0".to_string()],
            sdk: config::Sdk { min: 23, target: 34, compile: 36 },
            java: config::Java::default(),
            signing: None,
            toggles: [("desugaring".to_string(), true)].into_iter().collect(),
            alternatives: Default::default(),
            dependencies: vec![
                catalog::ResolvedDependency {
                    group: "com.android.tools".to_string(),
                    artifact: "desugar_jdk_libs".to_string(),
                    version: "2.1.5".to_string(),
                    scope: catalog::Scope::CoreLibraryDesugaring,
                    pinned_by: None,
                },
                catalog::ResolvedDependency {
                    group: "com.google.firebase".to_string(),
                    artifact: "firebase-auth".to_string(),
                    version: "34.4.0".to_string(),
                    scope: catalog::Scope::Implementation,
                    pinned_by: Some("com.google.firebase:firebase-bom:34.4.0".to_string()),
                },
            ],
        }
    }

    #[test]
    fn format_parse() {
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!("TOML".parse::<Format>(), Ok(Format::Toml));
        assert_eq!("properties".parse::<Format>(), Ok(Format::Properties));
        assert!("yaml".parse::<Format>().is_err());
    }

    #[test]
    fn render_json() {
        let s = render(&plan(), Format::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();

        assert_eq!(v["variant"], "release");
        assert_eq!(v["sdk"]["compile"], 36);
        assert_eq!(v["dependencies"][0]["scope"], "core-library-desugaring");
        assert_eq!(v["dependencies"][1]["pinned-by"], "com.google.firebase:firebase-bom:34.4.0");
        assert!(v["dependencies"][0].get("pinned-by").is_none());
        assert!(v.get("signing").is_none());
    }

    #[test]
    fn render_toml() {
        let s = render(&plan(), Format::Toml).unwrap();
        let v: toml::Table = toml::from_str(&s).unwrap();

        assert_eq!(v["application-id"].as_str(), Some("com.example.leadassist"));
        assert_eq!(v["sdk"]["min"].as_integer(), Some(23));
        assert_eq!(v["dependencies"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn render_properties() {
        let s = render(&plan(), Format::Properties).unwrap();

        assert!(s.contains("osiris.android.compileSdk=36\n"));
        assert!(s.contains("osiris.android.minSdk=23\n"));
        assert!(s.contains("osiris.toggle.desugaring=true\n"));
        assert!(s.contains("osiris.platform.0=com.google.firebase:firebase-bom:34.4.0\n"));
        assert!(s.contains(
            "osiris.dependency.0=coreLibraryDesugaring com.android.tools:desugar_jdk_libs:2.1.5\n",
        ));
        assert!(!s.contains("osiris.signing.identity"));
        assert!(!s.contains("osiris.android.ndkVersion"));
    }

    // Emitting the same plan twice only modifies the file once.
    #[test]
    fn emit_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("plan.json");

        assert!(emit(&plan(), Format::Json, &path).unwrap());
        assert!(!emit(&plan(), Format::Json, &path).unwrap());
        assert!(emit(&plan(), Format::Properties, &path).unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Generated by osiris-resolver\n"));
    }
}
