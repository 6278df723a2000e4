//! Osiris Build Variant Resolver
//!
//! The osiris resolver module interprets the declarative build configuration
//! of an Android application and resolves it into a concrete build plan for
//! each build variant. The configuration selects toolchain levels, declares
//! third-party dependencies (including version-managed bills-of-materials),
//! toggles platform compatibility shims, and picks a signing identity per
//! variant.
//!
//! The resolver does not compile, package, or sign anything. It configures
//! the external build tools that do, and it surfaces configuration mistakes
//! before any of those tools run.
//!
//! Model
//! -----
//!
//! The configuration is split into independent registries that are loaded
//! once from the manifest and never modified afterwards:
//!
//!  * The [dependency catalog](catalog) holds library coordinates, BOMs and
//!    alternatives.
//!  * The [feature toggle set](toggle) holds compatibility switches and the
//!    dependencies they require.
//!  * The [variant table](variant) holds the override layers of all build
//!    variants.
//!  * The [signing registry](signing) holds references to signing
//!    credentials.
//!  * The [base configuration](config) holds everything else.
//!
//! A variant is a sparse override over the base configuration. There is
//! exactly one base and one active variant per resolution. Variants never
//! inherit from each other.
//!
//! The [resolver](op::resolve) merges the registries for a requested variant
//! into a [build plan](plan). Resolution is a pure function of the loaded
//! state. It either yields a complete plan, or fails with an error naming
//! the offending part of the configuration.
//!
//! Manifest
//! --------
//!
//! The configuration is read from the Osiris Resolver Manifest. The manifest
//! is a TOML-formatted file usually called `osiris-resolver.toml` placed in
//! the application repository. See the [manifest](manifest) module for the
//! format. The `osiris-resolver` command-line tool parses the manifest and
//! prints the resolved plan of a variant as JSON, TOML, or Gradle project
//! properties.

pub mod catalog;
pub mod config;
pub mod manifest;
pub mod plan;
pub mod signing;
pub mod toggle;
pub mod variant;

/// Resolver Operations
///
/// The `op` module is a collection of all operations that can be performed via
/// the command-line interface. Each operation is implemented in a submodule
/// and can be used independently.
pub mod op {
    pub mod emit;
    pub mod resolve;
}
