use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{BotError, Result};

/// Number of selectable server roles ("1서버" through "10서버").
pub const SERVER_COUNT: u8 = 10;

/// Discord's limit on nickname length.
pub const NICKNAME_MAX_LEN: usize = 32;

/// Onboarding workflow configuration
/// Loaded from data/onboarding.json (every field is optional)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OnboardingConfig {
    /// Text channel the install command posts the start button into
    pub signup_channel_name: String,

    /// Placeholder role aliases granted on join, in lookup order.
    /// Only the ones that exist in the guild are used.
    pub initial_role_names: Vec<String>,

    /// Maximum age of an in-progress signup before it is evicted
    pub session_ttl_secs: u64,

    /// How often the session sweeper runs
    pub sweep_interval_secs: u64,

    /// Keep the in-progress signup when the permission check fails at
    /// nickname submission, so the user can resubmit after an admin fixes
    /// the role order.
    pub retain_session_on_permission_error: bool,

    /// React with 👍 to every non-bot message in the guild
    pub react_to_messages: bool,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            signup_channel_name: "가입하기".to_string(),
            initial_role_names: vec!["가입자".to_string(), "가입자<".to_string()],
            session_ttl_secs: 600,
            sweep_interval_secs: 60,
            retain_session_on_permission_error: false,
            react_to_messages: false,
        }
    }
}

impl OnboardingConfig {
    /// Load from a JSON file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BotError::ConfigLoad {
            path: path.to_string(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Load from a JSON file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &str) -> Result<Self> {
        match Self::load_from_file(path) {
            Err(BotError::ConfigLoad { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, path: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| BotError::ConfigParse {
            path: path.to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session_ttl_secs == 0 {
            return Err(BotError::ConfigValidation {
                message: "session_ttl_secs must be greater than zero".to_string(),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(BotError::ConfigValidation {
                message: "sweep_interval_secs must be greater than zero".to_string(),
            });
        }
        if self.initial_role_names.iter().all(|n| n.trim().is_empty()) {
            return Err(BotError::ConfigValidation {
                message: "initial_role_names needs at least one role name".to_string(),
            });
        }
        if self.signup_channel_name.trim().is_empty() {
            return Err(BotError::ConfigValidation {
                message: "signup_channel_name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let json = r##"{
            "signup_channel_name": "welcome",
            "retain_session_on_permission_error": true
        }"##;

        let config = OnboardingConfig::from_json(json).unwrap();
        assert_eq!(config.signup_channel_name, "welcome");
        assert!(config.retain_session_on_permission_error);
        assert_eq!(config.initial_role_names, vec!["가입자", "가입자<"]);
        assert_eq!(config.session_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r##"{ "signup_channel": "typo" }"##;
        assert!(matches!(
            OnboardingConfig::from_json(json),
            Err(BotError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let json = r##"{ "session_ttl_secs": 0 }"##;
        assert!(matches!(
            OnboardingConfig::from_json(json),
            Err(BotError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = OnboardingConfig::load_or_default("does/not/exist.json").unwrap();
        assert_eq!(config.signup_channel_name, "가입하기");
        assert!(!config.react_to_messages);
    }
}
