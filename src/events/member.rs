use poise::serenity_prelude::{self as serenity, GuildId, UserId};
use tracing::{debug, warn};

use crate::onboarding::{grant_initial_role, DiscordMember, GuildSnapshot, JoinTrigger, MemberState};
use crate::{Data, Error};

/// Give a new member the placeholder role, unless membership screening is
/// still pending for them.
pub async fn handle_member_add(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    if member.user.bot {
        return Ok(());
    }
    if member.pending {
        debug!(
            "Member {} joined guild {} with screening pending, waiting",
            member.user.id, member.guild_id
        );
        return Ok(());
    }

    grant(ctx, member.guild_id, member.user.id, MemberState::from(member), JoinTrigger::Joined, data)
        .await;
    Ok(())
}

/// Grant the placeholder role once a member passes membership screening.
///
/// Only fires when the previous member state is known, so a cache miss
/// never turns an unrelated update into a grant.
pub async fn handle_member_update(
    ctx: &serenity::Context,
    old: Option<&serenity::Member>,
    new: Option<&serenity::Member>,
    event: &serenity::GuildMemberUpdateEvent,
    data: &Data,
) -> Result<(), Error> {
    if event.user.bot {
        return Ok(());
    }
    let Some(old) = old else {
        return Ok(());
    };
    if !passed_screening(old.pending, event.pending) {
        return Ok(());
    }

    let state = match new {
        Some(member) => MemberState::from(member),
        None => MemberState {
            nick: event.nick.clone(),
            roles: event.roles.clone(),
        },
    };
    grant(ctx, event.guild_id, event.user.id, state, JoinTrigger::ScreeningPassed, data).await;
    Ok(())
}

fn passed_screening(was_pending: bool, is_pending: bool) -> bool {
    was_pending && !is_pending
}

async fn grant(
    ctx: &serenity::Context,
    guild_id: GuildId,
    user_id: UserId,
    state: MemberState,
    trigger: JoinTrigger,
    data: &Data,
) {
    let snapshot = match GuildSnapshot::load(ctx, guild_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Cannot grant initial role in guild {}: {}", guild_id, e);
            return;
        }
    };

    let member = DiscordMember::new(ctx.http.clone(), guild_id, user_id);
    let decision = grant_initial_role(&data.config, &snapshot, &member, &state, trigger).await;
    debug!("Initial role for {} in {}: {:?}", user_id, guild_id, decision);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passed_screening_only_on_true_to_false() {
        assert!(passed_screening(true, false));
        assert!(!passed_screening(false, false));
        assert!(!passed_screening(true, true));
        assert!(!passed_screening(false, true));
    }
}
