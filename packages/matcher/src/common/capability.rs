//! Closed capability vocabulary shared by needs and responders.
//!
//! Free-text skill labels were unreliable to match on, so normalization
//! happens once at the boundary: submissions carry arbitrary labels,
//! `Capability::from_label` folds known aliases into the closed set, and the
//! matcher itself only ever compares enum values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::error::DispatchError;

/// A normalized tag describing a skill or resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Medical,
    Water,
    Food,
    Shelter,
    Rescue,
    Transport,
    Communications,
    Sanitation,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Water => "water",
            Self::Food => "food",
            Self::Shelter => "shelter",
            Self::Rescue => "rescue",
            Self::Transport => "transport",
            Self::Communications => "communications",
            Self::Sanitation => "sanitation",
        }
    }

    /// Normalize a free-text label into the closed vocabulary.
    ///
    /// Case-insensitive; whitespace, hyphens and underscores are collapsed.
    /// Common aliases map onto their canonical tag.
    ///
    /// # Errors
    ///
    /// `DispatchError::UnknownCapability` for labels outside the vocabulary.
    pub fn from_label(label: &str) -> Result<Self, DispatchError> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        match normalized.as_str() {
            "medical" | "first aid" | "emt" | "medic" | "nurse" | "healthcare" => Ok(Self::Medical),
            "water" | "drinking water" | "water supply" => Ok(Self::Water),
            "food" | "meals" | "food supply" | "cooking" => Ok(Self::Food),
            "shelter" | "housing" | "temporary shelter" => Ok(Self::Shelter),
            "rescue" | "search and rescue" | "sar" => Ok(Self::Rescue),
            "transport" | "transportation" | "logistics" | "evacuation" | "driver" => {
                Ok(Self::Transport)
            }
            "communications" | "comms" | "radio" => Ok(Self::Communications),
            "sanitation" | "hygiene" | "wash" => Ok(Self::Sanitation),
            _ => Err(DispatchError::UnknownCapability(label.to_string())),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a batch of labels into a capability set.
///
/// Duplicates collapse; the first unknown label fails the whole batch so bad
/// input never half-enters the system.
pub fn normalize_labels<I, S>(labels: I) -> Result<BTreeSet<Capability>, DispatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|label| Capability::from_label(label.as_ref()))
        .collect()
}
