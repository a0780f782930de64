use std::num::NonZeroU64;

use crate::error::{BotError, Result};

/// Process-level settings taken from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bot authentication token (DISCORD_TOKEN, required)
    pub token: String,
    /// Guild to scope slash commands to (DISCORD_GUILD_ID)
    pub guild_id: Option<u64>,
    /// Liveness endpoint port (PORT)
    pub port: u16,
    /// Path of the onboarding config file (ONBOARDING_CONFIG)
    pub config_path: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(BotError::MissingEnv {
                name: "DISCORD_TOKEN",
            })?;

        let guild_id = match lookup("DISCORD_GUILD_ID") {
            Some(raw) if !raw.trim().is_empty() => {
                let id = raw.trim().parse::<NonZeroU64>().map_err(|_| {
                    BotError::ConfigValidation {
                        message: format!("DISCORD_GUILD_ID is not a valid id: '{}'", raw),
                    }
                })?;
                Some(id.get())
            }
            _ => None,
        };

        Ok(Self {
            token,
            guild_id,
            port: lookup("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            config_path: lookup("ONBOARDING_CONFIG")
                .unwrap_or_else(|| "data/onboarding.json".to_string()),
        })
    }
}
