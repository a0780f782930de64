use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::{Data, Error};

const ACK_REACTION: &str = "👍";

/// Acknowledge guild messages with a reaction when enabled
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    if !should_react(data.config.react_to_messages, msg.author.bot, msg.guild_id.is_some()) {
        return Ok(());
    }

    if let Err(e) = msg
        .react(&ctx.http, serenity::ReactionType::Unicode(ACK_REACTION.to_string()))
        .await
    {
        debug!("Could not react to message {}: {}", msg.id, e);
    }
    Ok(())
}

fn should_react(enabled: bool, from_bot: bool, in_guild: bool) -> bool {
    enabled && !from_bot && in_guild
}
