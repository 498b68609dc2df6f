//! Safety profiles keyed by backend model id.

use gateway_core::SafetySetting;

/// Harm categories every profile covers
pub const HARM_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

/// Threshold applied to every category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    /// Filtering disabled entirely
    Off,
    /// Nothing blocked, but filtering metadata still produced
    BlockNone,
}

impl SafetyProfile {
    /// Backend threshold string
    #[must_use]
    pub fn threshold(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::BlockNone => "BLOCK_NONE",
        }
    }

    /// Settings for every harm category
    #[must_use]
    pub fn settings(self) -> Vec<SafetySetting> {
        HARM_CATEGORIES
            .iter()
            .map(|category| SafetySetting::new(*category, self.threshold()))
            .collect()
    }
}

/// Models that accept the `OFF` threshold, by exact id
const PROFILES: &[(&str, SafetyProfile)] = &[("gemini-2.0-flash-exp", SafetyProfile::Off)];

/// Profile for a backend model id
#[must_use]
pub fn profile_for(model: &str) -> SafetyProfile {
    PROFILES
        .iter()
        .find(|(id, _)| *id == model)
        .map_or(SafetyProfile::BlockNone, |(_, profile)| *profile)
}

/// Caller overrides if present, the model's profile otherwise
pub fn resolve(model: &str, overrides: Option<&[SafetySetting]>) -> Vec<SafetySetting> {
    match overrides {
        Some(settings) => settings.to_vec(),
        None => profile_for(model).settings(),
    }
}
