use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, GuildId, Http, RoleId, UserId};
use std::sync::Arc;

use crate::error::Result;

/// Nickname and roles of a member as read from the platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberState {
    pub nick: Option<String>,
    pub roles: Vec<RoleId>,
}

impl MemberState {
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

impl From<&serenity::Member> for MemberState {
    fn from(member: &serenity::Member) -> Self {
        Self {
            nick: member.nick.clone(),
            roles: member.roles.clone(),
        }
    }
}

/// The mutations onboarding performs on one guild member
#[async_trait]
pub trait MemberEditor: Send + Sync {
    /// Read the member's current state, bypassing any cache
    async fn fetch(&self) -> Result<MemberState>;

    async fn set_nickname(&self, nickname: &str, reason: &str) -> Result<()>;

    async fn remove_roles(&self, roles: &[RoleId], reason: &str) -> Result<()>;

    async fn add_roles(&self, roles: &[RoleId], reason: &str) -> Result<()>;
}

/// [`MemberEditor`] backed by the Discord REST API
pub struct DiscordMember {
    http: Arc<Http>,
    guild_id: GuildId,
    user_id: UserId,
}

impl DiscordMember {
    pub fn new(http: Arc<Http>, guild_id: GuildId, user_id: UserId) -> Self {
        Self {
            http,
            guild_id,
            user_id,
        }
    }
}

#[async_trait]
impl MemberEditor for DiscordMember {
    async fn fetch(&self) -> Result<MemberState> {
        let member = self.http.get_member(self.guild_id, self.user_id).await?;
        Ok(MemberState::from(&member))
    }

    async fn set_nickname(&self, nickname: &str, reason: &str) -> Result<()> {
        self.guild_id
            .edit_member(
                self.http.as_ref(),
                self.user_id,
                serenity::EditMember::new()
                    .nickname(nickname)
                    .audit_log_reason(reason),
            )
            .await?;
        Ok(())
    }

    async fn remove_roles(&self, roles: &[RoleId], reason: &str) -> Result<()> {
        for role_id in roles {
            self.http
                .remove_member_role(self.guild_id, self.user_id, *role_id, Some(reason))
                .await?;
        }
        Ok(())
    }

    async fn add_roles(&self, roles: &[RoleId], reason: &str) -> Result<()> {
        for role_id in roles {
            self.http
                .add_member_role(self.guild_id, self.user_id, *role_id, Some(reason))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::BotError;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Nickname(String),
        Remove(Vec<RoleId>),
        Add(Vec<RoleId>),
    }

    impl Call {
        pub fn is_role_mutation(&self) -> bool {
            matches!(self, Call::Remove(_) | Call::Add(_))
        }
    }

    /// Which mutation should be rejected with a 403
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailOn {
        Nickname,
        Remove,
        Add,
    }

    /// In-memory member that records every mutation
    #[derive(Default)]
    pub struct FakeMember {
        pub state: Mutex<MemberState>,
        pub calls: Mutex<Vec<Call>>,
        pub fetches: Mutex<usize>,
        pub fail_on: Option<FailOn>,
    }

    impl FakeMember {
        pub fn with_roles(roles: Vec<RoleId>) -> Self {
            Self {
                state: Mutex::new(MemberState { nick: None, roles }),
                ..Default::default()
            }
        }

        pub fn failing(mut self, fail_on: FailOn) -> Self {
            self.fail_on = Some(fail_on);
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn snapshot(&self) -> MemberState {
            self.state.lock().clone()
        }

        fn check(&self, op: FailOn) -> Result<()> {
            if self.fail_on == Some(op) {
                return Err(BotError::PermissionDenied {
                    message: "Missing Permissions".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MemberEditor for FakeMember {
        async fn fetch(&self) -> Result<MemberState> {
            *self.fetches.lock() += 1;
            Ok(self.snapshot())
        }

        async fn set_nickname(&self, nickname: &str, _reason: &str) -> Result<()> {
            self.check(FailOn::Nickname)?;
            self.calls.lock().push(Call::Nickname(nickname.to_string()));
            self.state.lock().nick = Some(nickname.to_string());
            Ok(())
        }

        async fn remove_roles(&self, roles: &[RoleId], _reason: &str) -> Result<()> {
            self.check(FailOn::Remove)?;
            self.calls.lock().push(Call::Remove(roles.to_vec()));
            self.state.lock().roles.retain(|r| !roles.contains(r));
            Ok(())
        }

        async fn add_roles(&self, roles: &[RoleId], _reason: &str) -> Result<()> {
            self.check(FailOn::Add)?;
            self.calls.lock().push(Call::Add(roles.to_vec()));
            let mut state = self.state.lock();
            for role in roles {
                if !state.roles.contains(role) {
                    state.roles.push(*role);
                }
            }
            Ok(())
        }
    }
}
