//! The onboarding workflow: grade → server number → nickname, ending in a
//! reconciliation of the member's roles and display name.

pub mod flow;
pub mod join;
pub mod member;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod types;

pub use flow::{
    create_shared_onboarding_flow, log_signup_error, SharedOnboardingFlow,
    SignupOutcome,
};
pub use join::{grant_initial_role, JoinTrigger};
pub use member::{DiscordMember, MemberState};
pub use session::{create_session_store, spawn_session_sweeper, SharedSessionStore};
pub use snapshot::GuildSnapshot;
pub use types::{Grade, ServerNumber};
