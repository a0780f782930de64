//! Role and nickname reconciliation for a completed signup.
//!
//! The member's grade and server assignments are single-valued: the plan
//! removes every other role of the same partition, plus any placeholder
//! role, and adds only what is not already held. Applying an already
//! reconciled member therefore issues no role mutations at all.

use poise::serenity_prelude::RoleId;
use tracing::{info, warn};

use crate::config::OnboardingConfig;
use crate::error::{BotError, SignupError};
use crate::onboarding::member::{MemberEditor, MemberState};
use crate::onboarding::snapshot::GuildSnapshot;
use crate::onboarding::types::{Grade, ServerNumber};

pub const NICKNAME_REASON: &str = "가입 봇 자동 설정";
pub const REMOVE_REASON: &str = "가입 봇: 기존 역할 정리";
pub const ADD_REASON: &str = "가입 봇: 신규 역할 부여";

/// Which partition a role belongs to, by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Grade,
    Server,
    Initial,
}

fn partition_of(config: &OnboardingConfig, name: &str) -> Option<Partition> {
    if Grade::role_names().any(|n| n == name) {
        Some(Partition::Grade)
    } else if ServerNumber::role_names().any(|n| n == name) {
        Some(Partition::Server)
    } else if config.initial_role_names.iter().any(|n| n == name) {
        Some(Partition::Initial)
    } else {
        None
    }
}

/// The difference between a member's current and desired state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub grade: Grade,
    pub server: ServerNumber,
    /// Desired display name
    pub target_nickname: String,
    /// Set only when the current nickname differs
    pub nickname: Option<String>,
    pub grade_role: Option<RoleId>,
    pub server_role: RoleId,
    pub remove: Vec<RoleId>,
    pub add: Vec<RoleId>,
    /// Whether a placeholder role is among `remove`
    pub clears_initial_role: bool,
}

impl ReconcilePlan {
    /// Compute the plan. Fails before anything is touched if a target role
    /// is missing from the guild.
    pub fn build(
        config: &OnboardingConfig,
        snapshot: &GuildSnapshot,
        current: &MemberState,
        grade: Grade,
        server: ServerNumber,
        target_nickname: String,
    ) -> Result<Self, SignupError> {
        let grade_role = match grade.role_name() {
            Some(name) => Some(
                snapshot
                    .role_by_name(name)
                    .map(|r| r.id)
                    .ok_or_else(|| SignupError::MissingRole {
                        name: name.to_string(),
                    })?,
            ),
            None => None,
        };

        let server_name = server.role_name();
        let server_role = snapshot
            .role_by_name(&server_name)
            .map(|r| r.id)
            .ok_or(SignupError::MissingRole { name: server_name })?;

        let mut remove = Vec::new();
        let mut clears_initial_role = false;
        for role_id in &current.roles {
            let Some(name) = snapshot.role_name(*role_id) else {
                continue;
            };
            let remove_it = match partition_of(config, name) {
                Some(Partition::Grade) => Some(*role_id) != grade_role,
                Some(Partition::Server) => *role_id != server_role,
                Some(Partition::Initial) => {
                    clears_initial_role = true;
                    true
                }
                None => false,
            };
            if remove_it && !remove.contains(role_id) {
                remove.push(*role_id);
            }
        }

        let add = grade_role
            .into_iter()
            .chain(std::iter::once(server_role))
            .filter(|id| !current.has_role(*id))
            .collect();

        let nickname = (current.nick.as_deref() != Some(target_nickname.as_str()))
            .then(|| target_nickname.clone());

        Ok(Self {
            grade,
            server,
            target_nickname,
            nickname,
            grade_role,
            server_role,
            remove,
            add,
            clears_initial_role,
        })
    }

    pub fn is_noop(&self) -> bool {
        self.nickname.is_none() && self.remove.is_empty() && self.add.is_empty()
    }

    /// Apply in order: nickname, removals, additions. Empty steps are
    /// skipped. A failure stops the sequence; earlier steps are not undone.
    pub async fn apply(&self, editor: &dyn MemberEditor) -> Result<(), BotError> {
        if let Some(nickname) = &self.nickname {
            editor.set_nickname(nickname, NICKNAME_REASON).await?;
        }
        if !self.remove.is_empty() {
            editor.remove_roles(&self.remove, REMOVE_REASON).await?;
        }
        if !self.add.is_empty() {
            editor.add_roles(&self.add, ADD_REASON).await?;
        }
        info!(
            "Reconciled member: nick={:?}, removed {} role(s), added {} role(s)",
            self.nickname,
            self.remove.len(),
            self.add.len()
        );
        Ok(())
    }

    /// Compare a re-read member state against the intended end state.
    /// Returns a description of every mismatch.
    pub fn verify(
        &self,
        config: &OnboardingConfig,
        snapshot: &GuildSnapshot,
        after: &MemberState,
    ) -> Vec<String> {
        let mut problems = Vec::new();

        if after.nick.as_deref() != Some(self.target_nickname.as_str()) {
            problems.push(format!(
                "닉네임이 '{}'(으)로 확인되지 않았습니다",
                self.target_nickname
            ));
        }

        let held_in = |partition: Partition| -> Vec<RoleId> {
            after
                .roles
                .iter()
                .copied()
                .filter(|id| {
                    snapshot
                        .role_name(*id)
                        .and_then(|name| partition_of(config, name))
                        == Some(partition)
                })
                .collect()
        };

        let grades = held_in(Partition::Grade);
        let expected_grades: Vec<RoleId> = self.grade_role.into_iter().collect();
        if grades != expected_grades {
            problems.push(format!("등급 역할이 '{}'와(과) 일치하지 않습니다", self.grade));
        }

        if held_in(Partition::Server) != vec![self.server_role] {
            problems.push(format!("서버 역할이 '{}'와(과) 일치하지 않습니다", self.server));
        }

        if !held_in(Partition::Initial).is_empty() {
            problems.push("초기 역할이 아직 남아 있습니다".to_string());
        }

        if !problems.is_empty() {
            warn!("Post-reconcile verification mismatch: {:?}", problems);
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::member::fake::{Call, FakeMember};
    use crate::onboarding::snapshot::test_support::*;
    use crate::onboarding::types::compose_nickname;

    fn server(n: u8) -> ServerNumber {
        ServerNumber::new(n).unwrap()
    }

    fn state(snapshot: &GuildSnapshot, names: &[&str]) -> MemberState {
        MemberState {
            nick: None,
            roles: names.iter().map(|n| id_of(snapshot, n)).collect(),
        }
    }

    fn plan_for(
        snapshot: &GuildSnapshot,
        current: &MemberState,
        grade: Grade,
        n: u8,
        nick: &str,
    ) -> Result<ReconcilePlan, SignupError> {
        let display = compose_nickname(server(n), nick).unwrap();
        ReconcilePlan::build(
            &OnboardingConfig::default(),
            snapshot,
            current,
            grade,
            server(n),
            display,
        )
    }

    #[test]
    fn test_member_scenario() {
        let snapshot = full_guild();
        let current = state(&snapshot, &["운영진", "3서버", "가입자"]);
        let plan = plan_for(&snapshot, &current, Grade::Member, 5, "  Jiho  ").unwrap();

        assert_eq!(plan.nickname.as_deref(), Some("5서버/Jiho"));
        assert_eq!(plan.grade_role, None);
        assert_eq!(plan.add, vec![id_of(&snapshot, "5서버")]);
        assert_eq!(
            plan.remove,
            vec![
                id_of(&snapshot, "운영진"),
                id_of(&snapshot, "3서버"),
                id_of(&snapshot, "가입자")
            ]
        );
        assert!(plan.clears_initial_role);
    }

    #[test]
    fn test_staff_to_member_removes_without_replacement() {
        let snapshot = full_guild();
        let current = state(&snapshot, &["운영진", "4서버"]);
        let plan = plan_for(&snapshot, &current, Grade::Member, 4, "a").unwrap();
        assert_eq!(plan.remove, vec![id_of(&snapshot, "운영진")]);
        assert!(plan.add.is_empty());
    }

    #[test]
    fn test_server_switch_leaves_grade() {
        let snapshot = full_guild();
        let current = state(&snapshot, &["관리자", "3서버"]);
        let plan = plan_for(&snapshot, &current, Grade::Admin, 7, "a").unwrap();
        assert_eq!(plan.remove, vec![id_of(&snapshot, "3서버")]);
        assert_eq!(plan.add, vec![id_of(&snapshot, "7서버")]);
    }

    #[test]
    fn test_unrelated_roles_untouched() {
        let snapshot = full_guild();
        let current = state(&snapshot, &["Bot", "2서버"]);
        let plan = plan_for(&snapshot, &current, Grade::Staff, 2, "a").unwrap();
        assert!(plan.remove.is_empty());
        assert_eq!(plan.add, vec![id_of(&snapshot, "운영진")]);
    }

    #[test]
    fn test_missing_grade_role_aborts() {
        let snapshot = without_role(&full_guild(), "관리자");
        let current = MemberState::default();
        match plan_for(&snapshot, &current, Grade::Admin, 1, "a") {
            Err(SignupError::MissingRole { name }) => assert_eq!(name, "관리자"),
            other => panic!("unexpected: {:?}", other),
        }
        // Member needs no grade role, so the same guild is fine for it
        assert!(plan_for(&snapshot, &current, Grade::Member, 1, "a").is_ok());
    }

    #[test]
    fn test_missing_server_role_aborts() {
        let snapshot = without_role(&full_guild(), "9서버");
        match plan_for(&snapshot, &MemberState::default(), Grade::Member, 9, "a") {
            Err(SignupError::MissingRole { name }) => assert_eq!(name, "9서버"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_every_choice_converges() {
        let snapshot = full_guild();
        let config = OnboardingConfig::default();
        let prior = ["관리자", "운영진", "1서버", "10서버", "가입자", "가입자<"];

        for grade in Grade::ALL {
            for n in 1..=10 {
                let member = FakeMember::with_roles(state(&snapshot, &prior).roles);
                let current = member.snapshot();
                let plan = plan_for(&snapshot, &current, grade, n, " nick ").unwrap();
                plan.apply(&member).await.unwrap();

                let after = member.snapshot();
                assert!(plan.verify(&config, &snapshot, &after).is_empty());
                assert_eq!(after.nick, Some(format!("{}서버/nick", n)));
                assert!(after.has_role(id_of(&snapshot, &format!("{}서버", n))));
                match grade.role_name() {
                    Some(name) => assert!(after.has_role(id_of(&snapshot, name))),
                    None => {
                        assert!(!after.has_role(id_of(&snapshot, "관리자")));
                        assert!(!after.has_role(id_of(&snapshot, "운영진")));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let snapshot = full_guild();
        let member = FakeMember::with_roles(state(&snapshot, &["가입자", "2서버"]).roles);

        let first = plan_for(&snapshot, &member.snapshot(), Grade::Staff, 6, "x").unwrap();
        first.apply(&member).await.unwrap();
        let calls_after_first = member.calls().len();

        let second = plan_for(&snapshot, &member.snapshot(), Grade::Staff, 6, "x").unwrap();
        assert!(second.is_noop());
        second.apply(&member).await.unwrap();
        assert_eq!(member.calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_apply_order() {
        let snapshot = full_guild();
        let member = FakeMember::with_roles(state(&snapshot, &["가입자"]).roles);
        let plan = plan_for(&snapshot, &member.snapshot(), Grade::Admin, 1, "x").unwrap();
        plan.apply(&member).await.unwrap();

        assert_eq!(
            member.calls(),
            vec![
                Call::Nickname("1서버/x".to_string()),
                Call::Remove(vec![id_of(&snapshot, "가입자")]),
                Call::Add(vec![id_of(&snapshot, "관리자"), id_of(&snapshot, "1서버")]),
            ]
        );
    }

    #[test]
    fn test_verify_reports_leftovers() {
        let snapshot = full_guild();
        let config = OnboardingConfig::default();
        let plan = plan_for(&snapshot, &MemberState::default(), Grade::Member, 2, "x").unwrap();

        let mut after = state(&snapshot, &["2서버", "가입자<"]);
        after.nick = Some("2서버/x".to_string());
        let problems = plan.verify(&config, &snapshot, &after);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("초기 역할"));
    }
}
