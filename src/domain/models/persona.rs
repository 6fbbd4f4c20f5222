//! Persona profile domain model.
//!
//! A persona is compiled once per run from a free-text seed into four
//! facets. Each facet is generated independently; a facet that cannot be
//! generated falls back to a neutral default so the profile is always
//! complete.

use serde::{Deserialize, Serialize};

use super::turn::Degradation;

/// One of the four independently generated persona facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaFacet {
    FamilyBackground,
    WritingStyle,
    InteractionStyle,
    Intent,
}

impl PersonaFacet {
    /// All facets, in the order they appear in a profile.
    pub const ALL: [Self; 4] = [
        Self::FamilyBackground,
        Self::WritingStyle,
        Self::InteractionStyle,
        Self::Intent,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FamilyBackground => "family_background",
            Self::WritingStyle => "writing_style",
            Self::InteractionStyle => "interaction_style",
            Self::Intent => "intent",
        }
    }

    /// Neutral text used when the facet could not be generated.
    pub const fn neutral_default(&self) -> &'static str {
        match self {
            Self::FamilyBackground => {
                "An adult shopper with an ordinary household and no unusual constraints."
            }
            Self::WritingStyle => "Writes short, plain sentences in a neutral tone.",
            Self::InteractionStyle => {
                "Reads the suggestions, asks the occasional follow-up question, and clicks on items that look relevant."
            }
            Self::Intent => "Looking for a product that fits their needs at a reasonable price.",
        }
    }
}

impl std::fmt::Display for PersonaFacet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled persona for a single simulation run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Seed text the persona was expanded from.
    pub seed: String,
    pub family_background: String,
    pub writing_style: String,
    pub interaction_style: String,
    pub intent: String,
    /// Facets that fell back to their neutral default.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl PersonaProfile {
    /// Profile made entirely of neutral defaults.
    pub fn neutral(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            family_background: PersonaFacet::FamilyBackground.neutral_default().to_string(),
            writing_style: PersonaFacet::WritingStyle.neutral_default().to_string(),
            interaction_style: PersonaFacet::InteractionStyle.neutral_default().to_string(),
            intent: PersonaFacet::Intent.neutral_default().to_string(),
            degradations: Vec::new(),
        }
    }

    pub fn facet(&self, facet: PersonaFacet) -> &str {
        match facet {
            PersonaFacet::FamilyBackground => &self.family_background,
            PersonaFacet::WritingStyle => &self.writing_style,
            PersonaFacet::InteractionStyle => &self.interaction_style,
            PersonaFacet::Intent => &self.intent,
        }
    }

    pub(crate) fn set_facet(&mut self, facet: PersonaFacet, text: String) {
        match facet {
            PersonaFacet::FamilyBackground => self.family_background = text,
            PersonaFacet::WritingStyle => self.writing_style = text,
            PersonaFacet::InteractionStyle => self.interaction_style = text,
            PersonaFacet::Intent => self.intent = text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    /// Multi-line rendering used as prompt context.
    pub fn describe(&self) -> String {
        PersonaFacet::ALL
            .iter()
            .map(|f| format!("{}: {}", f.as_str(), self.facet(*f)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
