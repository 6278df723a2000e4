//! Signing Identity Registry
//!
//! Signing identities are named references to signing credentials. The
//! resolver never sees secret material. It only carries the credential
//! reference into the build plan, where the external signer resolves it.

/// Credential Reference
///
/// Opaque pointer to signing credentials, kept verbatim.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Credential {
    /// Key `alias` in the keystore at `path`.
    Keystore {
        path: String,
        alias: String,
    },
    /// Name of an environment variable the signer reads.
    Env {
        variable: String,
    },
    /// Reference understood only by the external signer.
    External {
        reference: String,
    },
}

/// Signing Identity
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SigningIdentity {
    pub name: String,
    pub credential: Credential,
    /// Whether this identity uses debug keys, not suitable for distribution.
    pub debug: bool,
}

/// Signing Errors
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// No identity with the given name is registered.
    #[error("unknown signing identity '{0}'")]
    UnknownSigningIdentity(String),
    /// An identity with the given name is already registered.
    #[error("signing identity '{0}' is registered more than once")]
    Duplicate(String),
}

/// Signing Identity Registry
#[derive(Clone, Debug, Default)]
pub struct Registry {
    identities: std::collections::BTreeMap<String, SigningIdentity>,
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register an identity. Names must be unique.
    pub fn register(&mut self, identity: SigningIdentity) -> Result<(), Error> {
        match self.identities.entry(identity.name.clone()) {
            std::collections::btree_map::Entry::Occupied(v) => {
                Err(Error::Duplicate(v.key().clone()))
            },
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(identity);
                Ok(())
            },
        }
    }

    /// Look up an identity by name.
    pub fn lookup(&self, name: &str) -> Result<&SigningIdentity, Error> {
        self.identities.get(name)
            .ok_or_else(|| Error::UnknownSigningIdentity(name.to_string()))
    }

    /// Iterate all identities in name order.
    pub fn identities(&self) -> impl Iterator<Item = &SigningIdentity> {
        self.identities.values()
    }
}
