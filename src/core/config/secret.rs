use std::fmt;

/// Credential material read from the environment. `Debug` and `Display` never
/// print the value, so settings can be logged without leaking keys.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SecretString(String);

impl SecretString {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// First non-empty variable among `keys`.
pub(super) fn secret_from_env(keys: &[&str]) -> Option<SecretString> {
    keys.iter().find_map(|key| super::parsing::env_optional(key)).map(SecretString::new)
}
