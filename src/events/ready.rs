use poise::serenity_prelude::{self as serenity, GuildId};
use tracing::{info, warn};

use crate::config::OnboardingConfig;
use crate::onboarding::GuildSnapshot;

/// Report whether each guild is set up for onboarding. Problems are only
/// logged; members get the same message when they press the start button.
pub async fn log_guild_readiness(
    ctx: &serenity::Context,
    guilds: &[GuildId],
    config: &OnboardingConfig,
) {
    for &guild_id in guilds {
        let snapshot = match GuildSnapshot::load(ctx, guild_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Could not inspect guild {}: {}", guild_id, e);
                continue;
            }
        };

        let check = snapshot
            .require_partition_roles()
            .and_then(|()| snapshot.check_bot_can_manage(config));
        match check {
            Ok(()) => info!("Guild {} is ready for onboarding", guild_id),
            Err(e) => warn!("Guild {} is not ready for onboarding: {}", guild_id, e),
        }
    }
}
