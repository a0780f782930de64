use poise::serenity_prelude::{self as serenity, ChannelId, GuildId, UserId};
use tracing::{debug, error, info, warn};

use crate::error::{BotError, SignupError};
use crate::messages::{install_done_message, START_SIGNUP_MESSAGE};
use crate::{ui, Context, Error};

/// How far back to look for earlier start messages
const HISTORY_SCAN_LIMIT: u8 = 50;

/// Post the signup start button in the signup channel
#[poise::command(
    slash_command,
    guild_only,
    rename = "가입하기설치",
    default_member_permissions = "ADMINISTRATOR",
    required_permissions = "ADMINISTRATOR"
)]
pub async fn install_signup(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command can only be used in a guild")?;
    let channel_name = ctx.data().config.signup_channel_name.clone();
    info!("install_signup called by {} in guild {}", ctx.author().name, guild_id);

    let channel = match find_text_channel(ctx.serenity_context(), guild_id, &channel_name).await {
        Ok(channel) => channel,
        Err(e) => {
            error!("Could not list channels of guild {}: {}", guild_id, e);
            let err = SignupError::from(e);
            ctx.send(poise::CreateReply::default()
                .content(err.user_message())
                .ephemeral(true))
                .await?;
            return Ok(());
        }
    };
    let Some(channel) = channel else {
        let err = SignupError::MissingChannel { name: channel_name };
        warn!("Cannot install signup message in guild {}: {}", guild_id, err);
        ctx.send(poise::CreateReply::default()
            .content(err.user_message())
            .ephemeral(true))
            .await?;
        return Ok(());
    };

    post_start_message(ctx.serenity_context(), channel.id).await?;

    ctx.send(poise::CreateReply::default()
        .content(install_done_message(&format!("<#{}>", channel.id)))
        .ephemeral(true))
        .await?;
    Ok(())
}

/// Post the signup start button in this channel
#[poise::command(
    slash_command,
    guild_only,
    rename = "가입버튼",
    default_member_permissions = "ADMINISTRATOR",
    required_permissions = "ADMINISTRATOR"
)]
pub async fn install_here(ctx: Context<'_>) -> Result<(), Error> {
    info!("install_here called by {} in channel {}", ctx.author().name, ctx.channel_id());
    post_start_message(ctx.serenity_context(), ctx.channel_id()).await?;

    ctx.send(poise::CreateReply::default()
        .content(install_done_message(&format!("<#{}>", ctx.channel_id())))
        .ephemeral(true))
        .await?;
    Ok(())
}

/// Replace any earlier start message of the bot in the channel with a new one
async fn post_start_message(ctx: &serenity::Context, channel_id: ChannelId) -> Result<(), Error> {
    let bot_id = ctx.cache.current_user().id;
    let removed = remove_previous_start_messages(ctx, channel_id, bot_id).await;
    if removed > 0 {
        debug!("Removed {} earlier start message(s) in {}", removed, channel_id);
    }

    channel_id
        .send_message(
            &ctx.http,
            serenity::CreateMessage::new()
                .content(START_SIGNUP_MESSAGE)
                .components(vec![ui::start_button_row()]),
        )
        .await?;
    Ok(())
}

/// Best effort: a failure here only leaves a duplicate button behind
async fn remove_previous_start_messages(
    ctx: &serenity::Context,
    channel_id: ChannelId,
    bot_id: UserId,
) -> usize {
    let messages = match channel_id
        .messages(&ctx.http, serenity::GetMessages::new().limit(HISTORY_SCAN_LIMIT))
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Could not read history of channel {}: {}", channel_id, e);
            return 0;
        }
    };

    let mut removed = 0;
    for msg in messages
        .iter()
        .filter(|m| is_start_message(m.author.id, &m.content, bot_id))
    {
        match msg.delete(&ctx.http).await {
            Ok(()) => removed += 1,
            Err(e) => warn!("Could not delete old start message {}: {}", msg.id, e),
        }
    }
    removed
}

fn is_start_message(author: UserId, content: &str, bot_id: UserId) -> bool {
    author == bot_id && content == START_SIGNUP_MESSAGE
}

/// Text channel with exactly this name. An API failure is an error, not a
/// missing channel.
async fn find_text_channel(
    ctx: &serenity::Context,
    guild_id: GuildId,
    name: &str,
) -> Result<Option<serenity::GuildChannel>, BotError> {
    let channels = guild_id.channels(&ctx.http).await?;
    Ok(pick_text_channel(channels.into_values(), name))
}

fn pick_text_channel(
    channels: impl IntoIterator<Item = serenity::GuildChannel>,
    name: &str,
) -> Option<serenity::GuildChannel> {
    channels
        .into_iter()
        .find(|channel| channel.kind == serenity::ChannelType::Text && channel.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_start_message() {
        let bot = UserId::new(1);
        let other = UserId::new(2);
        assert!(is_start_message(bot, START_SIGNUP_MESSAGE, bot));
        assert!(!is_start_message(other, START_SIGNUP_MESSAGE, bot));
        assert!(!is_start_message(bot, "다른 공지", bot));
    }

    #[test]
    fn test_channel_listing_failure_is_not_missing_channel() {
        let err = SignupError::from(BotError::Discord {
            message: "503 Service Unavailable".to_string(),
        });
        assert!(!matches!(err, SignupError::MissingChannel { .. }));
        assert_eq!(err.kind(), crate::error::SignupErrorKind::Platform);
        assert!(err.user_message().contains("503"));

        let err = SignupError::from(BotError::PermissionDenied {
            message: "Missing Access".to_string(),
        });
        assert!(matches!(err, SignupError::Forbidden));
    }

    #[test]
    fn test_pick_text_channel_without_match() {
        assert!(pick_text_channel(Vec::new(), "가입하기").is_none());
    }
}
