use poise::serenity_prelude::{self as serenity, GuildId, Http, Permissions, RoleId, UserId};
use std::collections::HashMap;
use tracing::debug;

use crate::config::OnboardingConfig;
use crate::error::{Result, SignupError};
use crate::onboarding::types::{Grade, ServerNumber};

/// A guild role as far as onboarding cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: RoleId,
    pub name: String,
    pub position: u16,
}

/// Point-in-time view of a guild's roles and of the bot's standing in it.
///
/// Taken freshly for every gated step; role configuration can change while
/// a member is halfway through onboarding.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    pub guild_id: GuildId,
    /// Sorted by position, lowest first
    roles: Vec<RoleInfo>,
    bot_permissions: Permissions,
    bot_top_position: Option<u16>,
}

impl GuildSnapshot {
    pub fn new(
        guild_id: GuildId,
        mut roles: Vec<RoleInfo>,
        bot_permissions: Permissions,
        bot_top_position: Option<u16>,
    ) -> Self {
        roles.sort_by_key(|r| (r.position, r.id));
        Self {
            guild_id,
            roles,
            bot_permissions,
            bot_top_position,
        }
    }

    /// Fetch the guild and the bot's member from the API (not the cache)
    pub async fn fetch(http: &Http, guild_id: GuildId, bot_id: UserId) -> Result<Self> {
        let guild = guild_id.to_partial_guild(http).await?;
        let bot_member = http.get_member(guild_id, bot_id).await?;
        Ok(Self::from_guild(&guild, &bot_member))
    }

    /// Use the gateway-maintained cache when it has the guild, otherwise
    /// fetch from the API
    pub async fn load(ctx: &serenity::Context, guild_id: GuildId) -> Result<Self> {
        let bot_id = ctx.cache.current_user().id;
        if let Some(snapshot) = Self::from_cache(&ctx.cache, guild_id, bot_id) {
            return Ok(snapshot);
        }
        debug!("Guild {} not cached, fetching", guild_id);
        Self::fetch(&ctx.http, guild_id, bot_id).await
    }

    pub fn from_cache(cache: &serenity::Cache, guild_id: GuildId, bot_id: UserId) -> Option<Self> {
        let guild = cache.guild(guild_id)?;
        let bot_member = guild.members.get(&bot_id)?;
        #[allow(deprecated)]
        let bot_permissions = guild.member_permissions(bot_member);
        Some(Self::from_roles(guild.id, &guild.roles, bot_member, bot_permissions))
    }

    pub fn from_guild(guild: &serenity::PartialGuild, bot_member: &serenity::Member) -> Self {
        #[allow(deprecated)]
        let bot_permissions = guild.member_permissions(bot_member);
        Self::from_roles(guild.id, &guild.roles, bot_member, bot_permissions)
    }

    fn from_roles(
        guild_id: GuildId,
        roles: &HashMap<RoleId, serenity::Role>,
        bot_member: &serenity::Member,
        bot_permissions: Permissions,
    ) -> Self {
        let bot_top_position = bot_member
            .roles
            .iter()
            .filter_map(|id| roles.get(id))
            .map(|r| r.position)
            .max();

        let roles = roles
            .values()
            .map(|r| RoleInfo {
                id: r.id,
                name: r.name.clone(),
                position: r.position,
            })
            .collect();

        Self::new(guild_id, roles, bot_permissions, bot_top_position)
    }

    /// First role with this exact name
    pub fn role_by_name(&self, name: &str) -> Option<&RoleInfo> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn role(&self, id: RoleId) -> Option<&RoleInfo> {
        self.roles.iter().find(|r| r.id == id)
    }

    /// Name of a role id, if the role still exists
    pub fn role_name(&self, id: RoleId) -> Option<&str> {
        self.role(id).map(|r| r.name.as_str())
    }

    /// Every name in the grade and server partitions must exist
    pub fn require_partition_roles(&self) -> std::result::Result<(), SignupError> {
        let names = Grade::role_names()
            .map(str::to_string)
            .chain(ServerNumber::role_names());

        for name in names {
            if self.role_by_name(&name).is_none() {
                debug!("Guild {} is missing role '{}'", self.guild_id, name);
                return Err(SignupError::MissingRole { name });
            }
        }
        Ok(())
    }

    /// Check the bot may edit nicknames and roles, and outranks every role it
    /// might add or remove.
    pub fn check_bot_can_manage(
        &self,
        config: &OnboardingConfig,
    ) -> std::result::Result<(), SignupError> {
        let admin = self.bot_permissions.administrator();
        if !admin && !self.bot_permissions.manage_roles() {
            return Err(SignupError::MissingPermission {
                permission: "Manage Roles(역할 관리)",
            });
        }
        if !admin && !self.bot_permissions.manage_nicknames() {
            return Err(SignupError::MissingPermission {
                permission: "Manage Nicknames(닉네임 관리)",
            });
        }

        for name in managed_role_names(config) {
            for role in self.roles.iter().filter(|r| r.name == name) {
                if !self.bot_outranks(role) {
                    return Err(SignupError::RoleAboveBot { name });
                }
            }
        }
        Ok(())
    }

    /// Whether the bot's highest role is strictly above `role`
    pub fn bot_outranks(&self, role: &RoleInfo) -> bool {
        self.bot_top_position
            .map(|top| role.position < top)
            .unwrap_or(false)
    }
}

/// Grade, server and placeholder role names: everything onboarding touches
pub fn managed_role_names(config: &OnboardingConfig) -> Vec<String> {
    Grade::role_names()
        .map(str::to_string)
        .chain(ServerNumber::role_names())
        .chain(config.initial_role_names.iter().cloned())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const BOT_ROLE_POSITION: u16 = 100;

    /// Snapshot with every onboarding role present below the bot
    pub fn full_guild() -> GuildSnapshot {
        let mut names: Vec<String> = Grade::role_names().map(str::to_string).collect();
        names.extend(ServerNumber::role_names());
        names.push("가입자".to_string());
        names.push("가입자<".to_string());
        names.push("Bot".to_string());

        let roles = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| RoleInfo {
                id: RoleId::new(1000 + i as u64),
                position: if name == "Bot" {
                    BOT_ROLE_POSITION
                } else {
                    i as u16 + 1
                },
                name,
            })
            .collect();

        GuildSnapshot::new(
            GuildId::new(1),
            roles,
            Permissions::MANAGE_ROLES | Permissions::MANAGE_NICKNAMES,
            Some(BOT_ROLE_POSITION),
        )
    }

    pub fn without_role(snapshot: &GuildSnapshot, name: &str) -> GuildSnapshot {
        let roles = snapshot
            .roles
            .iter()
            .filter(|r| r.name != name)
            .cloned()
            .collect();
        GuildSnapshot::new(
            snapshot.guild_id,
            roles,
            snapshot.bot_permissions,
            snapshot.bot_top_position,
        )
    }

    pub fn with_permissions(snapshot: &GuildSnapshot, permissions: Permissions) -> GuildSnapshot {
        let mut out = snapshot.clone();
        out.bot_permissions = permissions;
        out
    }

    pub fn with_role_moved(snapshot: &GuildSnapshot, name: &str, position: u16) -> GuildSnapshot {
        let mut out = snapshot.clone();
        for role in out.roles.iter_mut().filter(|r| r.name == name) {
            role.position = position;
        }
        out.roles.sort_by_key(|r| (r.position, r.id));
        out
    }

    pub fn id_of(snapshot: &GuildSnapshot, name: &str) -> RoleId {
        snapshot.role_by_name(name).map(|r| r.id).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_full_guild_passes() {
        let snapshot = full_guild();
        assert!(snapshot.require_partition_roles().is_ok());
        assert!(snapshot
            .check_bot_can_manage(&OnboardingConfig::default())
            .is_ok());
    }

    #[test]
    fn test_missing_partition_role_named() {
        let snapshot = without_role(&full_guild(), "7서버");
        match snapshot.require_partition_roles() {
            Err(SignupError::MissingRole { name }) => assert_eq!(name, "7서버"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_initial_role_is_not_required() {
        let snapshot = without_role(&full_guild(), "가입자<");
        assert!(snapshot.require_partition_roles().is_ok());
        assert!(snapshot
            .check_bot_can_manage(&OnboardingConfig::default())
            .is_ok());
    }

    #[test]
    fn test_missing_permissions() {
        let config = OnboardingConfig::default();
        let snapshot = with_permissions(&full_guild(), Permissions::MANAGE_NICKNAMES);
        assert!(matches!(
            snapshot.check_bot_can_manage(&config),
            Err(SignupError::MissingPermission { .. })
        ));

        let snapshot = with_permissions(&full_guild(), Permissions::MANAGE_ROLES);
        match snapshot.check_bot_can_manage(&config) {
            Err(SignupError::MissingPermission { permission }) => {
                assert!(permission.contains("Nicknames"))
            }
            other => panic!("unexpected: {:?}", other),
        }

        let snapshot = with_permissions(&full_guild(), Permissions::ADMINISTRATOR);
        assert!(snapshot.check_bot_can_manage(&config).is_ok());
    }

    #[test]
    fn test_role_at_bot_position_fails() {
        let snapshot = with_role_moved(&full_guild(), "관리자", BOT_ROLE_POSITION);
        match snapshot.check_bot_can_manage(&OnboardingConfig::default()) {
            Err(SignupError::RoleAboveBot { name }) => assert_eq!(name, "관리자"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_bot_without_roles_outranks_nothing() {
        let base = full_guild();
        let snapshot = GuildSnapshot::new(
            base.guild_id,
            base.roles.clone(),
            Permissions::ADMINISTRATOR,
            None,
        );
        assert!(matches!(
            snapshot.check_bot_can_manage(&OnboardingConfig::default()),
            Err(SignupError::RoleAboveBot { .. })
        ));
    }
}
