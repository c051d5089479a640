//! Peer identifiers.

use std::fmt;

/// Names the peer whose shared secret an operation uses.
///
/// `Default` is the unicast slot used when the caller talks to a single peer.
/// It is a separate variant, so no caller-chosen name can alias it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeerId {
    #[default]
    Default,
    Named(String),
}

impl PeerId {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    /// The caller-chosen name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl From<&str> for PeerId {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for PeerId {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<&PeerId> for PeerId {
    fn from(peer: &PeerId) -> Self {
        peer.clone()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default peer"),
            Self::Named(name) => write!(f, "peer {name:?}"),
        }
    }
}
