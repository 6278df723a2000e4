//! Variant Definition Table
//!
//! Variants are named override layers over the base configuration, like
//! `debug` or `release`. The model is strictly two-level: a variant
//! overrides the base, but never another variant.

/// Variant Overrides
///
/// Sparse record of values a variant replaces. Any field left unset
/// inherits the value of the base configuration. Map-typed fields replace
/// the base value per entry.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Overrides {
    /// Name of the signing identity to use instead of the base identity.
    pub signing: Option<String>,
    pub toggles: std::collections::BTreeMap<String, bool>,
    pub alternatives: std::collections::BTreeMap<String, String>,

    pub min_sdk: Option<u32>,
    pub target_sdk: Option<u32>,
    pub compile_sdk: Option<u32>,

    pub version_code: Option<u32>,
    pub version_name: Option<String>,
    /// Appended to the base application ID.
    pub application_id_suffix: Option<String>,
    /// Appended to the effective version name.
    pub version_name_suffix: Option<String>,

    pub debuggable: Option<bool>,
    pub minify: Option<bool>,
}

/// Build Variant
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Variant {
    pub name: String,
    pub overrides: Overrides,
}

/// No variant with the given name is defined.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// A variant with the given name is already defined.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("variant '{0}' is defined more than once")]
pub struct DuplicateVariant(pub String);

/// Variant Definition Table
///
/// The table keeps variants in definition order.
#[derive(Clone, Debug, Default)]
pub struct VariantTable {
    variants: Vec<Variant>,
}

impl VariantTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Define a variant
    ///
    /// Add a new variant with the given overrides. Names must be unique
    /// within the table.
    pub fn define_variant(
        &mut self,
        name: impl Into<String>,
        overrides: Overrides,
    ) -> Result<(), DuplicateVariant> {
        let name = name.into();

        if self.variants.iter().any(|v| v.name == name) {
            return Err(DuplicateVariant(name));
        }

        self.variants.push(Variant {
            name: name,
            overrides: overrides,
        });

        Ok(())
    }

    /// Look up a variant by name.
    pub fn get_variant(&self, name: &str) -> Result<&Variant, UnknownVariant> {
        self.variants.iter()
            .find(|v| v.name == name)
            .ok_or_else(|| UnknownVariant(name.to_string()))
    }

    /// Iterate variant names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
