// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier for an outstanding broker request.
///
/// # Performance
/// Uses UUID v4 for globally unique identifiers with excellent collision
/// resistance. Implements cheap cloning via Copy trait.
///
/// # Example
/// ```rust
/// use fluxmesh_rt::util::RequestId;
///
/// let id1 = RequestId::new();
/// let id2 = RequestId::new();
/// assert_ne!(id1, id2); // Globally unique
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new random RequestId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a RequestId from its string form.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a request/response session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
