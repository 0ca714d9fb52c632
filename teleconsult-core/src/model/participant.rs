use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one call participant (doctor or patient), as established by
/// the authentication collaborator before the channel connects. Opaque here.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Fresh random identity. Used by tests and anonymous connections.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
