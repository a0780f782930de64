use poise::serenity_prelude::UserId;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::OnboardingConfig;
use crate::error::{SignupError, SignupErrorKind};
use crate::onboarding::member::MemberEditor;
use crate::onboarding::reconcile::ReconcilePlan;
use crate::onboarding::session::{PendingSignup, SharedSessionStore};
use crate::onboarding::snapshot::GuildSnapshot;
use crate::onboarding::types::{compose_nickname, parse_composed_nickname, Grade, ServerNumber};

/// Verified result of a completed signup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupOutcome {
    pub grade: Grade,
    pub server: ServerNumber,
    pub nickname: String,
    /// A placeholder role was removed
    pub cleared_initial_role: bool,
    /// Nothing had to change
    pub already_applied: bool,
    /// Mismatches found when re-reading the member afterwards
    pub problems: Vec<String>,
}

/// Drives one member through grade → server → nickname.
///
/// Every transition holds the member's lock token from the session store,
/// so duplicate interactions for one member are handled one at a time.
pub struct OnboardingFlow {
    config: Arc<OnboardingConfig>,
    sessions: SharedSessionStore,
}

impl OnboardingFlow {
    pub fn new(config: Arc<OnboardingConfig>, sessions: SharedSessionStore) -> Self {
        Self { config, sessions }
    }

    pub fn sessions(&self) -> &SharedSessionStore {
        &self.sessions
    }

    /// Gate for the start button. On success any stale signup of the user
    /// is dropped; on failure nothing is created.
    pub async fn start(&self, user_id: UserId, snapshot: &GuildSnapshot) -> Result<(), SignupError> {
        let _guard = self.sessions.lock_user(user_id).await;
        snapshot.require_partition_roles()?;
        snapshot.check_bot_can_manage(&self.config)?;
        self.sessions.discard(user_id);
        info!("User {} started signup in guild {}", user_id, snapshot.guild_id);
        Ok(())
    }

    pub async fn choose_grade(&self, user_id: UserId, value: &str) -> Result<Grade, SignupError> {
        let _guard = self.sessions.lock_user(user_id).await;
        let grade = Grade::parse(value)?;
        self.sessions.choose_grade(user_id, grade);
        Ok(grade)
    }

    pub async fn choose_server(
        &self,
        user_id: UserId,
        value: &str,
    ) -> Result<PendingSignup, SignupError> {
        let _guard = self.sessions.lock_user(user_id).await;
        let server = ServerNumber::parse(value)?;
        let entry = self.sessions.choose_server(user_id, server)?;
        debug!("User {} signup now at {:?}", user_id, entry.stage());
        Ok(entry)
    }

    /// Final transition: validate, reconcile roles and nickname, verify.
    ///
    /// `load_snapshot` is only awaited once the selections and the nickname
    /// are valid, so rejected input costs no platform call.
    ///
    /// The pending signup is consumed whatever the outcome, except that a
    /// failed permission check keeps it when
    /// `retain_session_on_permission_error` is set.
    pub async fn submit_nickname<L, Fut>(
        &self,
        user_id: UserId,
        raw_nickname: &str,
        load_snapshot: L,
        member: &dyn MemberEditor,
    ) -> Result<SignupOutcome, SignupError>
    where
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<GuildSnapshot, SignupError>>,
    {
        let _guard = self.sessions.lock_user(user_id).await;

        let entry = self.sessions.take(user_id)?;
        let server = entry.server.ok_or(SignupError::MissingSelection)?;
        let grade = entry.grade;
        let nickname = compose_nickname(server, raw_nickname)?;

        let snapshot = load_snapshot().await?;
        let snapshot = &snapshot;

        if let Err(e) = snapshot.check_bot_can_manage(&self.config) {
            if self.config.retain_session_on_permission_error {
                warn!("Keeping signup of user {} after setup problem: {}", user_id, e);
                self.sessions.restore(user_id, entry);
            }
            return Err(e);
        }

        let current = member.fetch().await?;
        if let Some((previous_server, previous_name)) =
            current.nick.as_deref().and_then(parse_composed_nickname)
        {
            info!(
                "User {} re-registering, previously {} as '{}'",
                user_id, previous_server, previous_name
            );
        }
        let plan = ReconcilePlan::build(&self.config, snapshot, &current, grade, server, nickname)?;

        if let Err(e) = plan.apply(member).await {
            let err = SignupError::from(e);
            error!("Applying signup for user {} failed: {}", user_id, err);
            return Err(err);
        }

        let problems = match member.fetch().await {
            Ok(after) => plan.verify(&self.config, snapshot, &after),
            Err(e) => {
                warn!("Could not re-read member {} after signup: {}", user_id, e);
                vec!["변경 후 상태를 확인하지 못했습니다".to_string()]
            }
        };

        info!(
            "User {} completed signup: grade={}, server={}, nick='{}'",
            user_id, grade, server, plan.target_nickname
        );

        Ok(SignupOutcome {
            grade,
            server,
            already_applied: plan.is_noop(),
            cleared_initial_role: plan.clears_initial_role,
            nickname: plan.target_nickname,
            problems,
        })
    }
}

/// Log a failed step at a level matching its class
pub fn log_signup_error(user_id: UserId, step: &str, err: &SignupError) {
    match err.kind() {
        SignupErrorKind::Validation => info!("Signup {} rejected for {}: {}", step, user_id, err),
        SignupErrorKind::Configuration => {
            warn!("Signup {} blocked by configuration for {}: {}", step, user_id, err)
        }
        SignupErrorKind::Platform => error!("Signup {} failed for {}: {}", step, user_id, err),
    }
}

pub type SharedOnboardingFlow = Arc<OnboardingFlow>;

pub fn create_shared_onboarding_flow(
    config: Arc<OnboardingConfig>,
    sessions: SharedSessionStore,
) -> SharedOnboardingFlow {
    Arc::new(OnboardingFlow::new(config, sessions))
}
