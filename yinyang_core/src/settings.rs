//! Per-session settings and partial updates.

use serde::{Deserialize, Serialize};

use crate::failure::Failure;

pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Settings that shape each request. Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub auto_persist: bool,
    pub coding_mode: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            auto_persist: true,
            coding_mode: false,
        }
    }
}

/// A partial settings update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_persist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_mode: Option<bool>,
}

impl SettingsPatch {
    #[must_use]
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn max_tokens(max_tokens: u32) -> Self {
        Self {
            model: None,
            max_tokens: Some(max_tokens),
            auto_persist: None,
            coding_mode: None,
        }
    }

    #[must_use]
    pub const fn coding_mode(enabled: bool) -> Self {
        Self {
            model: None,
            max_tokens: None,
            auto_persist: None,
            coding_mode: Some(enabled),
        }
    }
}

impl SessionSettings {
    /// Merge `patch` into a copy of these settings and validate the result.
    ///
    /// `allowed_models` restricts the model identifier when non-empty.
    pub fn merged(&self, patch: &SettingsPatch, allowed_models: &[String]) -> Result<Self, Failure> {
        let mut next = self.clone();
        if let Some(model) = &patch.model {
            next.model = model.trim().to_string();
        }
        if let Some(max_tokens) = patch.max_tokens {
            next.max_tokens = max_tokens;
        }
        if let Some(auto_persist) = patch.auto_persist {
            next.auto_persist = auto_persist;
        }
        if let Some(coding_mode) = patch.coding_mode {
            next.coding_mode = coding_mode;
        }
        next.validate(allowed_models)?;
        Ok(next)
    }

    pub fn validate(&self, allowed_models: &[String]) -> Result<(), Failure> {
        if self.max_tokens == 0 {
            return Err(Failure::invalid_config("max_tokens must be greater than zero"));
        }
        if self.model.is_empty() {
            return Err(Failure::invalid_config("model must not be empty"));
        }
        if !allowed_models.is_empty() && !allowed_models.iter().any(|m| m == &self.model) {
            return Err(Failure::invalid_config(format!(
                "unknown model '{}'",
                self.model
            )));
        }
        Ok(())
    }
}
