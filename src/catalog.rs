//! Dependency Catalog
//!
//! The catalog holds all library coordinates declared by an application,
//! together with the bills-of-materials (BOMs) that pin versions of library
//! families, and the alternatives that select one of several mutually
//! exclusive libraries.
//!
//! Resolution turns the declared coordinates into a list of concrete
//! coordinates. BOM pins are applied first, with the last registered BOM
//! winning on conflicting pins. Explicit versions are overlaid on top and
//! always win over a BOM pin. A coordinate that requests a managed version
//! but is not pinned by any BOM cannot be resolved.

/// Coordinate Key
///
/// The `group:artifact` pair identifying a library independent of its
/// version. Two coordinates with the same key refer to the same library.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Key {
    pub group: String,
    pub artifact: String,
}

/// Coordinate Version
///
/// A coordinate either carries an explicit version, or leaves the version
/// to be supplied by a BOM.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Version {
    Explicit(String),
    Managed,
}

/// Dependency Scope
///
/// The Gradle configuration a dependency is added to. Most dependencies use
/// `implementation`. Desugaring libraries must be added to
/// `coreLibraryDesugaring`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    #[default]
    Implementation,
    Api,
    CompileOnly,
    RuntimeOnly,
    CoreLibraryDesugaring,
    TestImplementation,
    AndroidTestImplementation,
}

/// Dependency Coordinate
///
/// A library reference as declared in the manifest. The textual form is
/// `group:artifact:version` for explicit versions, or `group:artifact` for
/// managed versions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Coordinate {
    pub key: Key,
    pub version: Version,
    pub scope: Scope,
}

/// Coordinate Parser Error
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid dependency coordinate '{0}', expected 'group:artifact[:version]'")]
pub struct ParseError(pub String);

/// Bill of Materials
///
/// A BOM is a coordinate in its own right, and additionally pins versions
/// for a set of other libraries. The pins are immutable once the BOM is
/// created.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bom {
    pub key: Key,
    pub version: String,
    pins: std::collections::BTreeMap<Key, String>,
}

/// Dependency Alternative
///
/// A named set of mutually exclusive coordinates. Exactly one option is
/// selected at a time. The default selection can be overridden per
/// resolution, which is how variants pick a different implementation of
/// the same library.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alternative {
    pub name: String,
    pub selected: String,
    options: std::collections::BTreeMap<String, Coordinate>,
}

/// Resolved Dependency
///
/// A concrete coordinate as produced by catalog resolution. If the version
/// was supplied by a BOM, the BOM coordinate is recorded in `pinned_by`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResolvedDependency {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_by: Option<String>,
}

/// Catalog Errors
///
/// This is the exhaustive list of errors raised by catalog resolution. All
/// of them are authoring errors in the declarative input.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// A managed coordinate is not pinned by any registered BOM.
    #[error("managed dependency '{0}' is not pinned by any bill-of-materials")]
    UnresolvedManagedVersion(Key),
    /// The same library was declared with two different explicit versions.
    #[error("dependency '{key}' is declared with conflicting versions '{first}' and '{second}'")]
    DuplicateCoordinate {
        key: Key,
        first: String,
        second: String,
    },
    /// A selection names an alternative or option that does not exist.
    #[error("alternative '{alternative}' has no option '{option}'")]
    UnknownAlternative {
        alternative: String,
        option: String,
    },
}

/// Dependency Catalog
///
/// Collection of BOMs, coordinates and alternatives. The catalog is filled
/// once and then only read. Resolution never modifies it.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    boms: Vec<Bom>,
    dependencies: Vec<Coordinate>,
    alternatives: Vec<Alternative>,
}

impl Key {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

// Parse `group:artifact` keys, as used for BOM pins.
impl std::str::FromStr for Key {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<Coordinate>()? {
            Coordinate { key, version: Version::Managed, .. } => Ok(key),
            _ => Err(ParseError(s.to_string())),
        }
    }
}

impl Scope {
    /// Get Gradle configuration name
    ///
    /// Return the name of the Gradle dependency configuration matching this
    /// scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Implementation => "implementation",
            Scope::Api => "api",
            Scope::CompileOnly => "compileOnly",
            Scope::RuntimeOnly => "runtimeOnly",
            Scope::CoreLibraryDesugaring => "coreLibraryDesugaring",
            Scope::TestImplementation => "testImplementation",
            Scope::AndroidTestImplementation => "androidTestImplementation",
        }
    }
}

impl Coordinate {
    /// Create coordinate with explicit version
    pub fn explicit(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            key: Key::new(group, artifact),
            version: Version::Explicit(version.into()),
            scope: Scope::default(),
        }
    }

    /// Create coordinate with managed version
    pub fn managed(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            key: Key::new(group, artifact),
            version: Version::Managed,
            scope: Scope::default(),
        }
    }

    /// Replace the scope of the coordinate.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Version::Explicit(v) => write!(f, "{}:{}", self.key, v),
            Version::Managed => write!(f, "{}", self.key),
        }
    }
}

// Parse coordinates from their textual form
//
// Accept `group:artifact` as managed coordinate and `group:artifact:version`
// as explicit coordinate. All parts must be non-empty and free of
// whitespace. The scope defaults to `implementation`.
impl std::str::FromStr for Coordinate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();

        if parts.iter().any(|v| v.is_empty() || v.chars().any(char::is_whitespace)) {
            return Err(ParseError(s.to_string()));
        }

        match parts.as_slice() {
            [group, artifact] => Ok(Self::managed(*group, *artifact)),
            [group, artifact, version] => Ok(Self::explicit(*group, *artifact, *version)),
            _ => Err(ParseError(s.to_string())),
        }
    }
}

impl Bom {
    /// Create a new BOM
    ///
    /// Create a BOM with the given coordinate and pins. If a key is pinned
    /// multiple times, the last pin is retained.
    pub fn new(
        key: Key,
        version: impl Into<String>,
        pins: impl IntoIterator<Item = (Key, String)>,
    ) -> Self {
        Self {
            key: key,
            version: version.into(),
            pins: pins.into_iter().collect(),
        }
    }

    /// Return the version pinned for `key`, if any.
    pub fn pin(&self, key: &Key) -> Option<&str> {
        self.pins.get(key).map(String::as_str)
    }

    /// Iterate all pins in key order.
    pub fn pins(&self) -> impl Iterator<Item = (&Key, &str)> {
        self.pins.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Return the textual `group:artifact:version` form of the BOM.
    pub fn coordinate(&self) -> String {
        format!("{}:{}", self.key, self.version)
    }
}

impl Alternative {
    /// Create a new alternative
    ///
    /// Fails with `Error::UnknownAlternative` if the default selection is
    /// not one of the options.
    pub fn new(
        name: impl Into<String>,
        selected: impl Into<String>,
        options: impl IntoIterator<Item = (String, Coordinate)>,
    ) -> Result<Self, Error> {
        let v = Self {
            name: name.into(),
            selected: selected.into(),
            options: options.into_iter().collect(),
        };

        if !v.options.contains_key(&v.selected) {
            return Err(Error::UnknownAlternative {
                alternative: v.name,
                option: v.selected,
            });
        }

        Ok(v)
    }

    /// Return the coordinate of the named option, if any.
    pub fn option(&self, name: &str) -> Option<&Coordinate> {
        self.options.get(name)
    }

    /// Iterate all option names in sorted order.
    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }
}

// Working entry of a catalog resolution. The position in the working list
// is the position of the first declaration of the key.
struct Entry<'a> {
    coordinate: &'a Coordinate,
    explicit: Option<&'a str>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a BOM. Later BOMs win over earlier ones on conflicting pins.
    pub fn add_bom(&mut self, bom: Bom) {
        self.boms.push(bom);
    }

    /// Declare a dependency coordinate.
    pub fn add_dependency(&mut self, coordinate: Coordinate) {
        self.dependencies.push(coordinate);
    }

    /// Declare an alternative.
    pub fn add_alternative(&mut self, alternative: Alternative) {
        self.alternatives.push(alternative);
    }

    pub fn boms(&self) -> &[Bom] {
        &self.boms
    }

    pub fn dependencies(&self) -> &[Coordinate] {
        &self.dependencies
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Find an alternative by name.
    pub fn alternative(&self, name: &str) -> Option<&Alternative> {
        self.alternatives.iter().find(|v| v.name == name)
    }

    /// Resolve the catalog
    ///
    /// Resolve all declared coordinates using the default selection of each
    /// alternative. See `resolve_with()` for details.
    pub fn resolve(&self) -> Result<Vec<ResolvedDependency>, Error> {
        self.resolve_with(&std::collections::BTreeMap::new())
    }

    /// Resolve the catalog with alternative selections
    ///
    /// Resolve all declared coordinates into concrete coordinates. The
    /// selected option of each alternative is treated like a declared
    /// coordinate, appended after the plain declarations. `selections` maps
    /// alternative names to the option to use instead of the default.
    ///
    /// The result is ordered by first declaration of each key. A key that is
    /// declared multiple times keeps the position and scope of its first
    /// declaration.
    pub fn resolve_with(
        &self,
        selections: &std::collections::BTreeMap<String, String>,
    ) -> Result<Vec<ResolvedDependency>, Error> {
        // Verify all selections refer to known options before doing any
        // other work, so a typo in a selection is reported as such.
        for (name, option) in selections.iter() {
            let known = self.alternative(name)
                .map_or(false, |v| v.option(option).is_some());
            if !known {
                return Err(Error::UnknownAlternative {
                    alternative: name.clone(),
                    option: option.clone(),
                });
            }
        }

        // Collect all BOM pins. BOMs are applied in registration order, so
        // later pins replace earlier ones.
        let mut pins: std::collections::BTreeMap<&Key, (&str, &Bom)> = Default::default();
        for bom in self.boms.iter() {
            for (key, version) in bom.pins() {
                pins.insert(key, (version, bom));
            }
        }

        let selected = self.alternatives.iter().filter_map(|v| {
            let option = selections.get(&v.name).unwrap_or(&v.selected);
            v.option(option)
        });

        // Merge all declarations by key. Managed declarations never conflict
        // with anything. Explicit declarations conflict only with another
        // explicit declaration of a different version.
        let mut entries: Vec<Entry<'_>> = Vec::new();
        let mut index: std::collections::BTreeMap<&Key, usize> = Default::default();
        for coordinate in self.dependencies.iter().chain(selected) {
            let explicit = match &coordinate.version {
                Version::Explicit(v) => Some(v.as_str()),
                Version::Managed => None,
            };

            match index.get(&coordinate.key) {
                None => {
                    index.insert(&coordinate.key, entries.len());
                    entries.push(Entry { coordinate: coordinate, explicit: explicit });
                },
                Some(&i) => {
                    let entry = &mut entries[i];
                    match (entry.explicit, explicit) {
                        (Some(first), Some(second)) if first != second => {
                            return Err(Error::DuplicateCoordinate {
                                key: coordinate.key.clone(),
                                first: first.to_string(),
                                second: second.to_string(),
                            });
                        },
                        (None, Some(_)) => entry.explicit = explicit,
                        _ => {},
                    }
                },
            }
        }

        entries.into_iter().map(|entry| {
            let key = &entry.coordinate.key;
            let (version, pinned_by) = match entry.explicit {
                Some(v) => (v.to_string(), None),
                None => {
                    let (v, bom) = pins.get(key).ok_or_else(
                        || Error::UnresolvedManagedVersion(key.clone()),
                    )?;
                    (v.to_string(), Some(bom.coordinate()))
                },
            };

            Ok(ResolvedDependency {
                group: key.group.clone(),
                artifact: key.artifact.clone(),
                version: version,
                scope: entry.coordinate.scope,
                pinned_by: pinned_by,
            })
        }).collect()
    }
}

impl ResolvedDependency {
    /// Return the textual `group:artifact:version` form.
    pub fn coordinate(&self) -> String {
        format!("{}:{}:{}", self.group, self.artifact, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firebase_bom(version: &str, auth: &str) -> Bom {
        Bom::new(
            Key::new("com.google.firebase", "firebase-bom"),
            version,
            [(Key::new("com.google.firebase", "firebase-auth"), auth.to_string())],
        )
    }

    // Verify coordinate parsing
    //
    // Two-part coordinates are managed, three-part coordinates are explicit.
    // Anything else, as well as empty parts, is refused.
    #[test]
    fn coordinate_parse() {
        let c: Coordinate = "com.google.firebase:firebase-auth".parse().unwrap();
        assert_eq!(c.version, Version::Managed);
        assert_eq!(c.scope, Scope::Implementation);

        let c: Coordinate = "androidx.multidex:multidex:2.0.1".parse().unwrap();
        assert_eq!(c.version, Version::Explicit("2.0.1".to_string()));
        assert_eq!(c.to_string(), "androidx.multidex:multidex:2.0.1");

        assert!("multidex".parse::<Coordinate>().is_err());
        assert!("a::1".parse::<Coordinate>().is_err());
        assert!("a:b:c:d".parse::<Coordinate>().is_err());
        assert!("a:b c".parse::<Coordinate>().is_err());
        assert!("a:b:1".parse::<Key>().is_err());
    }

    // Verify managed coordinates are resolved through BOM pins
    #[test]
    fn resolve_managed() {
        let mut catalog = Catalog::new();
        catalog.add_bom(firebase_bom("34.4.0", "34.4.0"));
        catalog.add_dependency(Coordinate::managed("com.google.firebase", "firebase-auth"));

        let r = catalog.resolve().unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].coordinate(), "com.google.firebase:firebase-auth:34.4.0");
        assert_eq!(r[0].pinned_by.as_deref(), Some("com.google.firebase:firebase-bom:34.4.0"));
    }

    // Verify unpinned managed coordinates fail
    #[test]
    fn resolve_managed_unpinned() {
        let mut catalog = Catalog::new();
        catalog.add_bom(firebase_bom("34.4.0", "34.4.0"));
        catalog.add_dependency(Coordinate::managed("com.google.firebase", "firebase-firestore"));

        assert_eq!(
            catalog.resolve().unwrap_err(),
            Error::UnresolvedManagedVersion(Key::new("com.google.firebase", "firebase-firestore")),
        );

        let mut catalog = Catalog::new();
        catalog.add_dependency(Coordinate::managed("com.google.firebase", "firebase-auth"));
        assert!(matches!(catalog.resolve(), Err(Error::UnresolvedManagedVersion(_))));
    }

    // Verify explicit versions win over BOM pins
    //
    // Registering a BOM pin of `1.0` and an explicit `2.0` yields `2.0`,
    // regardless of whether a managed declaration comes first.
    #[test]
    fn resolve_explicit_over_pin() {
        let mut catalog = Catalog::new();
        catalog.add_bom(firebase_bom("1.0", "1.0"));
        catalog.add_dependency(Coordinate::managed("com.google.firebase", "firebase-auth"));
        catalog.add_dependency(Coordinate::explicit("com.google.firebase", "firebase-auth", "2.0"));

        let r = catalog.resolve().unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].version, "2.0");
        assert_eq!(r[0].pinned_by, None);
    }

    // Verify the last registered BOM wins on conflicting pins
    #[test]
    fn resolve_last_bom_wins() {
        let mut catalog = Catalog::new();
        catalog.add_bom(firebase_bom("33.0.0", "33.0.0"));
        catalog.add_bom(firebase_bom("34.4.0", "34.4.0"));
        catalog.add_dependency(Coordinate::managed("com.google.firebase", "firebase-auth"));

        let r = catalog.resolve().unwrap();
        assert_eq!(r[0].version, "34.4.0");
    }

    // Verify conflicting explicit versions are refused, but repeated
    // identical declarations are merged.
    #[test]
    fn resolve_duplicates() {
        let mut catalog = Catalog::new();
        catalog.add_dependency(Coordinate::explicit("androidx.multidex", "multidex", "2.0.1"));
        catalog.add_dependency(
            Coordinate::explicit("androidx.multidex", "multidex", "2.0.1")
                .with_scope(Scope::Api),
        );

        let r = catalog.resolve().unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].scope, Scope::Implementation);

        catalog.add_dependency(Coordinate::explicit("androidx.multidex", "multidex", "2.0.0"));
        assert_eq!(
            catalog.resolve().unwrap_err(),
            Error::DuplicateCoordinate {
                key: Key::new("androidx.multidex", "multidex"),
                first: "2.0.1".to_string(),
                second: "2.0.0".to_string(),
            },
        );
    }

    // Verify resolution keeps declaration order
    #[test]
    fn resolve_order() {
        let mut catalog = Catalog::new();
        catalog.add_dependency(Coordinate::explicit("b", "b", "1"));
        catalog.add_dependency(Coordinate::explicit("a", "a", "1"));
        catalog.add_dependency(Coordinate::explicit("c", "c", "1"));

        let r: Vec<String> = catalog.resolve().unwrap()
            .iter()
            .map(|v| v.artifact.clone())
            .collect();
        assert_eq!(r, ["b", "a", "c"]);
    }

    // Verify alternatives contribute exactly their selected option
    #[test]
    fn resolve_alternatives() {
        let mut catalog = Catalog::new();
        catalog.add_bom(Bom::new(
            Key::new("com.google.firebase", "firebase-bom"),
            "34.4.0",
            [
                (Key::new("com.google.firebase", "firebase-auth"), "34.4.0".to_string()),
                (Key::new("com.google.firebase", "firebase-auth-ktx"), "23.2.1".to_string()),
            ],
        ));
        catalog.add_alternative(Alternative::new(
            "firebase-auth",
            "standard",
            [
                ("standard".to_string(), Coordinate::managed("com.google.firebase", "firebase-auth")),
                ("ktx".to_string(), Coordinate::managed("com.google.firebase", "firebase-auth-ktx")),
            ],
        ).unwrap());

        let r = catalog.resolve().unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].artifact, "firebase-auth");

        let mut selections = std::collections::BTreeMap::new();
        selections.insert("firebase-auth".to_string(), "ktx".to_string());
        let r = catalog.resolve_with(&selections).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].coordinate(), "com.google.firebase:firebase-auth-ktx:23.2.1");

        selections.insert("firebase-auth".to_string(), "legacy".to_string());
        assert!(matches!(
            catalog.resolve_with(&selections),
            Err(Error::UnknownAlternative { .. }),
        ));

        assert!(Alternative::new("x", "missing", std::iter::empty()).is_err());
    }

    // Verify resolution does not modify the catalog
    #[test]
    fn resolve_pure() {
        let mut catalog = Catalog::new();
        catalog.add_bom(firebase_bom("34.4.0", "34.4.0"));
        catalog.add_dependency(Coordinate::managed("com.google.firebase", "firebase-auth"));

        let a = catalog.resolve().unwrap();
        let b = catalog.resolve().unwrap();
        assert_eq!(a, b);
        assert_eq!(catalog.dependencies().len(), 1);
        assert_eq!(catalog.dependencies()[0].version, Version::Managed);
    }
}
