use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Lifecycle/grade tag carried by every product record.
///
/// Always travels over the wire by name (`NEW`, `OPEN_BOX`, `USED`, `UNKNOWN`),
/// never by ordinal.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    New,
    OpenBox,
    Used,
    #[default]
    Unknown,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::New,
        Condition::OpenBox,
        Condition::Used,
        Condition::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::New => "NEW",
            Condition::OpenBox => "OPEN_BOX",
            Condition::Used => "USED",
            Condition::Unknown => "UNKNOWN",
        }
    }
}

impl core::fmt::Display for Condition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = DomainError;

    /// Case-exact match against the four names; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "'condition' not valid: '{s}' (expected one of NEW, OPEN_BOX, USED, UNKNOWN)"
                ))
            })
    }
}
