use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity assigned by the rendezvous server when a connection is accepted.
/// Stable for the lifetime of that connection; used both as routing address
/// and as tie-break input for negotiation politeness.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Deterministic tie-break: the lexically smaller identity yields
    /// (rolls back its own offer) when both sides offer at once. Both
    /// peers compute this from the same pair, so they always agree.
    pub fn polite_toward(&self, other: &PeerId) -> bool {
        self < other
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> PeerId {
        PeerId::parse(s).unwrap()
    }

    #[test]
    fn politeness_is_antisymmetric() {
        let a = id("11111111-1111-1111-1111-111111111111");
        let b = id("22222222-2222-2222-2222-222222222222");
        assert!(a.polite_toward(&b));
        assert!(!b.polite_toward(&a));
        assert_ne!(a.polite_toward(&b), b.polite_toward(&a));
    }

    #[test]
    fn politeness_agrees_for_random_pairs() {
        for _ in 0..64 {
            let a = PeerId::new();
            let b = PeerId::new();
            if a == b {
                continue;
            }
            assert_ne!(a.polite_toward(&b), b.polite_toward(&a));
        }
    }
}
