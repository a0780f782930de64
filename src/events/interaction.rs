use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, ComponentInteractionDataKind,
    CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, ModalInteraction,
};
use tracing::{debug, error, warn};

use crate::error::SignupError;
use crate::messages::{GRADE_PROMPT, SERVER_PROMPT};
use crate::onboarding::{log_signup_error, DiscordMember, GuildSnapshot};
use crate::{messages, ui, Data, Error};

/// Route button, menu and modal interactions. Slash commands are handled
/// by the framework.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::Interaction,
    data: &Data,
) -> Result<(), Error> {
    match interaction {
        serenity::Interaction::Component(component) => {
            match component.data.custom_id.as_str() {
                ui::START_BUTTON_ID => handle_start(ctx, component, data).await,
                ui::GRADE_SELECT_ID => handle_grade(ctx, component, data).await,
                ui::SERVER_SELECT_ID => handle_server(ctx, component, data).await,
                other => {
                    debug!("Ignoring component '{}'", other);
                    Ok(())
                }
            }
        }
        serenity::Interaction::Modal(modal) if modal.data.custom_id == ui::NICKNAME_MODAL_ID => {
            handle_nickname(ctx, modal, data).await
        }
        _ => Ok(()),
    }
}

fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

fn selected_value(component: &ComponentInteraction) -> Option<&str> {
    match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}

async fn reply_error(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    step: &str,
    err: SignupError,
) -> Result<(), Error> {
    log_signup_error(component.user.id, step, &err);
    component
        .create_response(&ctx.http, ephemeral(err.user_message()))
        .await?;
    Ok(())
}

async fn handle_start(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    let snapshot = match GuildSnapshot::load(ctx, guild_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Could not load guild {} for signup: {}", guild_id, e);
            let err = if e.is_permission_denied() {
                SignupError::Forbidden
            } else {
                SignupError::BotMemberUnavailable
            };
            return reply_error(ctx, component, "start", err).await;
        }
    };

    match data.onboarding.start(component.user.id, &snapshot).await {
        Ok(()) => {
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(GRADE_PROMPT)
                            .components(vec![ui::grade_menu_row()])
                            .ephemeral(true),
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, component, "start", e).await,
    }
}

async fn handle_grade(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let value = selected_value(component).unwrap_or_default();
    match data.onboarding.choose_grade(component.user.id, value).await {
        Ok(_) => {
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .content(SERVER_PROMPT)
                            .components(vec![ui::server_menu_row()]),
                    ),
                )
                .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, component, "grade", e).await,
    }
}

async fn handle_server(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let value = selected_value(component).unwrap_or_default();
    match data.onboarding.choose_server(component.user.id, value).await {
        Ok(_) => {
            component
                .create_response(&ctx.http, CreateInteractionResponse::Modal(ui::nickname_modal()))
                .await?;
            Ok(())
        }
        Err(e) => reply_error(ctx, component, "server", e).await,
    }
}

async fn handle_nickname(
    ctx: &serenity::Context,
    modal: &ModalInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = modal.guild_id else {
        return Ok(());
    };
    let user_id = modal.user.id;
    let raw_nickname =
        ui::modal_value(&modal.data.components, ui::NICKNAME_INPUT_ID).unwrap_or_default();

    // Member edits can take longer than the acknowledgement window
    modal
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    let bot_id = ctx.cache.current_user().id;
    let member = DiscordMember::new(ctx.http.clone(), guild_id, user_id);
    let load_snapshot = move || async move {
        GuildSnapshot::fetch(&ctx.http, guild_id, bot_id)
            .await
            .map_err(|e| {
                error!("Failed to load guild {} for signup: {}", guild_id, e);
                SignupError::Platform {
                    message: messages::MEMBER_UNAVAILABLE.to_string(),
                }
            })
    };
    let result = data
        .onboarding
        .submit_nickname(user_id, &raw_nickname, load_snapshot, &member)
        .await;

    let content = match result {
        Ok(outcome) => messages::confirmation_message(&outcome),
        Err(e) => {
            log_signup_error(user_id, "nickname", &e);
            e.user_message()
        }
    };

    modal
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}
