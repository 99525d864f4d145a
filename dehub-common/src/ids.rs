use std::fmt;

/// Opaque, caller-assigned, non-empty UTF-8 identifier for a servant.
///
/// Lookup by prefix is part of the contract (masters may abbreviate), so this
/// type is a thin `String` newtype rather than anything that would make
/// prefix comparisons awkward.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ServantId(String);

impl ServantId {
    /// Builds a `ServantId`. Empty ids are rejected at the edges (CLI parsing,
    /// `HubHeader` decoding) rather than here, so this never needs to fail.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for ServantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ServantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
