//! Feature Toggle Set
//!
//! Toggles are named boolean switches like `desugaring` or `multidex` that
//! gate platform compatibility shims. A toggle can declare dependencies that
//! become mandatory while the toggle is enabled. The toggle set only reports
//! these requirements; merging them into a catalog is up to the caller.

use crate::catalog;

/// Feature Toggle
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Toggle {
    pub name: String,
    pub enabled: bool,
    /// Coordinates required while the toggle is enabled.
    pub requires: Vec<catalog::Coordinate>,
}

/// Feature Toggle Set
///
/// Set of toggles indexed by name. Toggles are independent of each other
/// and have no ordering. Unknown toggles are reported as disabled.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ToggleSet {
    toggles: std::collections::BTreeMap<String, Toggle>,
}

impl Toggle {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled: enabled,
            requires: Vec::new(),
        }
    }

    /// Add a coordinate required while the toggle is enabled.
    pub fn requiring(mut self, coordinate: catalog::Coordinate) -> Self {
        self.requires.push(coordinate);
        self
    }
}

impl ToggleSet {
    pub fn new() -> Self {
        Default::default()
    }

    /// Declare a toggle
    ///
    /// Add the toggle with its requirements to the set. A previous toggle
    /// with the same name is replaced.
    pub fn declare(&mut self, toggle: Toggle) {
        self.toggles.insert(toggle.name.clone(), toggle);
    }

    /// Set the state of a toggle
    ///
    /// Enable or disable the named toggle. If the toggle was not declared,
    /// it is added without any requirements.
    pub fn set_toggle(&mut self, name: &str, enabled: bool) {
        match self.toggles.get_mut(name) {
            Some(v) => v.enabled = enabled,
            None => self.declare(Toggle::new(name, enabled)),
        }
    }

    /// Check whether a toggle with the given name was declared.
    pub fn is_declared(&self, name: &str) -> bool {
        self.toggles.contains_key(name)
    }

    /// Query the state of a toggle. Unknown toggles are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.toggles.get(name).map_or(false, |v| v.enabled)
    }

    /// Iterate the names of all enabled toggles in sorted order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.toggles.values().filter(|v| v.enabled).map(|v| v.name.as_str())
    }

    /// Return the state of every known toggle.
    pub fn states(&self) -> std::collections::BTreeMap<String, bool> {
        self.toggles.values().map(|v| (v.name.clone(), v.enabled)).collect()
    }

    /// Collect required dependencies
    ///
    /// Return the coordinates required by the given toggles, in the order
    /// the names are given and then in declaration order. Identical
    /// coordinates required by multiple toggles are reported once. Names of
    /// undeclared toggles contribute nothing.
    pub fn required_dependencies_for<'a>(
        &self,
        enabled: impl IntoIterator<Item = &'a str>,
    ) -> Vec<catalog::Coordinate> {
        let mut acc: Vec<catalog::Coordinate> = Vec::new();

        for name in enabled {
            let Some(toggle) = self.toggles.get(name) else {
                continue;
            };
            for coordinate in toggle.requires.iter() {
                if !acc.contains(coordinate) {
                    acc.push(coordinate.clone());
                }
            }
        }

        acc
    }

    /// Apply overrides
    ///
    /// Return a new set with the states of the given toggles replaced. The
    /// original set is left untouched.
    pub fn with_overrides(
        &self,
        overrides: &std::collections::BTreeMap<String, bool>,
    ) -> Self {
        let mut v = self.clone();
        for (name, enabled) in overrides.iter() {
            v.set_toggle(name, *enabled);
        }
        v
    }
}
