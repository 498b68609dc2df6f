//! Model-name decoding and the static model catalog.
//!
//! Clients address behaviour variants by suffixing a backend model id:
//! `gemini-2.0-flash-search` asks for search grounding,
//! `gemini-2.0-flash-exp-image` for image output and
//! `gemini-2.5-flash-non-thinking` for a zero reasoning budget. Suffixes may
//! be stacked; they are stripped from the end until none remains.

use gateway_core::ModelCatalog;

/// Suffix requesting search grounding
pub const SEARCH_SUFFIX: &str = "-search";
/// Suffix requesting image output
pub const IMAGE_SUFFIX: &str = "-image";
/// Suffix requesting reasoning to be disabled
pub const NON_THINKING_SUFFIX: &str = "-non-thinking";

/// A requested model name split into the backend model and its modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVariant {
    /// Name as requested by the client
    pub requested: String,
    /// Backend model id with every variant suffix removed
    pub real: String,
    /// `-search` was present
    pub is_search: bool,
    /// `-image` was present
    pub is_image: bool,
    /// `-non-thinking` was present
    pub is_non_thinking: bool,
}

impl ModelVariant {
    /// Decode a requested model name
    pub fn parse(model: &str) -> Self {
        let requested = model.trim().trim_start_matches("models/");
        let mut real = requested;
        let mut variant = Self {
            requested: requested.to_string(),
            real: String::new(),
            is_search: false,
            is_image: false,
            is_non_thinking: false,
        };

        loop {
            if let Some(rest) = real.strip_suffix(NON_THINKING_SUFFIX) {
                variant.is_non_thinking = true;
                real = rest;
            } else if let Some(rest) = real.strip_suffix(SEARCH_SUFFIX) {
                variant.is_search = true;
                real = rest;
            } else if let Some(rest) = real.strip_suffix(IMAGE_SUFFIX) {
                variant.is_image = true;
                real = rest;
            } else {
                break;
            }
        }

        variant.real = real.to_string();
        variant
    }

    /// Whether the requested name mentions `-thinking`, including the
    /// `-non-thinking` suffix
    #[must_use]
    pub fn mentions_thinking(&self) -> bool {
        self.requested.contains("-thinking")
    }

    /// Whether the backend model is a `pro` tier model
    #[must_use]
    pub fn is_pro(&self) -> bool {
        self.real.contains("pro")
    }
}

/// Catalog backed by configured model lists
///
/// An empty `models` list accepts any base model. Variant suffixes are only
/// accepted for models listed for that variant.
#[derive(Debug, Clone, Default)]
pub struct StaticModelCatalog {
    models: Vec<String>,
    search_models: Vec<String>,
    image_models: Vec<String>,
    thinking_models: Vec<String>,
}

impl StaticModelCatalog {
    /// Create a catalog over base model ids
    pub fn new(models: Vec<String>) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }

    /// Models that may be requested with `-search`
    #[must_use]
    pub fn with_search_models(mut self, models: Vec<String>) -> Self {
        self.search_models = models;
        self
    }

    /// Models that may be requested with `-image`
    #[must_use]
    pub fn with_image_models(mut self, models: Vec<String>) -> Self {
        self.image_models = models;
        self
    }

    /// Models that may be requested with `-non-thinking`
    #[must_use]
    pub fn with_thinking_models(mut self, models: Vec<String>) -> Self {
        self.thinking_models = models;
        self
    }

    fn listed(list: &[String], model: &str) -> bool {
        list.iter().any(|m| m == model)
    }
}

impl ModelCatalog for StaticModelCatalog {
    fn is_model_supported(&self, model: &str) -> bool {
        let variant = ModelVariant::parse(model);
        if variant.real.is_empty() {
            return false;
        }

        let base_ok = self.models.is_empty() || Self::listed(&self.models, &variant.real);
        base_ok
            && (!variant.is_search || Self::listed(&self.search_models, &variant.real))
            && (!variant.is_image || Self::listed(&self.image_models, &variant.real))
            && (!variant.is_non_thinking || Self::listed(&self.thinking_models, &variant.real))
    }

    fn models(&self) -> Vec<String> {
        let mut names = self.models.clone();
        names.extend(self.search_models.iter().map(|m| format!("{m}{SEARCH_SUFFIX}")));
        names.extend(self.image_models.iter().map(|m| format!("{m}{IMAGE_SUFFIX}")));
        names.extend(
            self.thinking_models
                .iter()
                .map(|m| format!("{m}{NON_THINKING_SUFFIX}")),
        );
        names
    }
}
