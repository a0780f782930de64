pub mod onboarding;
pub mod settings;

pub use onboarding::{OnboardingConfig, NICKNAME_MAX_LEN, SERVER_COUNT};
pub use settings::Settings;
