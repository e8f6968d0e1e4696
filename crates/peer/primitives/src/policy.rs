use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Per-peer connection policy, persisted by a policy store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ConnectionPolicy {
    #[default]
    Unknown,
    Forbidden,
    Allowed,
}

impl ConnectionPolicy {
    pub fn permits_connect(&self) -> bool {
        !matches!(self, Self::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_connect() {
        assert!(ConnectionPolicy::Unknown.permits_connect());
        assert!(ConnectionPolicy::Allowed.permits_connect());
        assert!(!ConnectionPolicy::Forbidden.permits_connect());
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "Forbidden".parse::<ConnectionPolicy>().unwrap(),
            ConnectionPolicy::Forbidden
        );
        assert!("maybe".parse::<ConnectionPolicy>().is_err());
    }
}
