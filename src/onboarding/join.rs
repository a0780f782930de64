use poise::serenity_prelude::RoleId;
use tracing::{info, warn};

use crate::config::OnboardingConfig;
use crate::onboarding::member::{MemberEditor, MemberState};
use crate::onboarding::snapshot::GuildSnapshot;

/// What caused the placeholder grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinTrigger {
    /// Member joined a guild without membership screening
    Joined,
    /// Member accepted the screening rules
    ScreeningPassed,
}

impl JoinTrigger {
    pub fn audit_reason(self) -> &'static str {
        match self {
            JoinTrigger::Joined => "자동 초기 역할 (on_member_join)",
            JoinTrigger::ScreeningPassed => "자동 초기 역할 (screening passed)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialRoleDecision {
    Grant { role: RoleId, name: String },
    AlreadyHeld { name: String },
    /// The bot's highest role is not above the placeholder
    OutOfReach { name: String },
    /// None of the configured aliases exist in the guild
    NotFound,
}

/// Pick the first configured placeholder alias that exists in the guild
/// and decide whether to grant it.
pub fn decide_initial_role(
    config: &OnboardingConfig,
    snapshot: &GuildSnapshot,
    current: &MemberState,
) -> InitialRoleDecision {
    let Some(role) = config
        .initial_role_names
        .iter()
        .find_map(|name| snapshot.role_by_name(name))
    else {
        return InitialRoleDecision::NotFound;
    };

    let name = role.name.clone();
    if !snapshot.bot_outranks(role) {
        InitialRoleDecision::OutOfReach { name }
    } else if current.has_role(role.id) {
        InitialRoleDecision::AlreadyHeld { name }
    } else {
        InitialRoleDecision::Grant {
            role: role.id,
            name,
        }
    }
}

/// Grant the placeholder role if needed. Never fails: every problem is
/// logged and the decision returned.
pub async fn grant_initial_role(
    config: &OnboardingConfig,
    snapshot: &GuildSnapshot,
    member: &dyn MemberEditor,
    current: &MemberState,
    trigger: JoinTrigger,
) -> InitialRoleDecision {
    let decision = decide_initial_role(config, snapshot, current);
    match &decision {
        InitialRoleDecision::Grant { role, name } => {
            match member.add_roles(&[*role], trigger.audit_reason()).await {
                Ok(()) => info!("Granted initial role '{}' ({:?})", name, trigger),
                Err(e) if e.is_permission_denied() => {
                    warn!(
                        "Missing permission to grant initial role '{}': check Manage Roles and role order",
                        name
                    );
                }
                Err(e) => warn!("Failed to grant initial role '{}': {}", name, e),
            }
        }
        InitialRoleDecision::AlreadyHeld { name } => {
            info!("Member already holds initial role '{}'", name);
        }
        InitialRoleDecision::OutOfReach { name } => {
            warn!(
                "Role order problem: the bot's role must be above '{}' to grant it",
                name
            );
        }
        InitialRoleDecision::NotFound => {
            info!(
                "None of the initial roles {:?} exist in guild {}",
                config.initial_role_names, snapshot.guild_id
            );
        }
    }
    decision
}
