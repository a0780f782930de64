use poise::serenity_prelude as serenity;
use serenity::HttpError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Failed to load config file '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    #[error("Missing environment variable: {name}")]
    MissingEnv { name: &'static str },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // Permission errors
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, BotError::PermissionDenied { .. })
    }
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
            if response.status_code.as_u16() == 403 {
                return BotError::PermissionDenied {
                    message: response.error.message.clone(),
                };
            }
        }
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

/// Which side has to act to fix a failed signup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupErrorKind {
    /// Guild administration has to fix roles, channels or permissions.
    Configuration,
    /// The user has to start over with valid input.
    Validation,
    /// The platform rejected a call; state may be partially applied.
    Platform,
}

/// Errors surfaced to the user during the onboarding workflow.
///
/// The `Display` text is shown to the member verbatim.
#[derive(Error, Debug)]
pub enum SignupError {
    #[error("역할 누락: '{name}' 역할이 서버에 필요합니다. 관리자에게 역할 생성 요청 후 다시 시도해주세요.")]
    MissingRole { name: String },

    #[error("'{name}' 채널을 찾지 못했습니다. 채널을 먼저 만들고 다시 실행하세요.")]
    MissingChannel { name: String },

    #[error("봇에 '{permission}' 권한이 필요합니다.")]
    MissingPermission { permission: &'static str },

    #[error("봇 역할이 '{name}' 역할보다 위에 있어야 합니다. (서버 설정 → 역할 순서)")]
    RoleAboveBot { name: String },

    #[error("봇 멤버 정보를 가져오지 못했습니다.")]
    BotMemberUnavailable,

    #[error("입력값이 누락되었습니다. 처음부터 다시 시도해주세요.")]
    MissingSelection,

    #[error("닉네임이 비어 있습니다. 처음부터 다시 시도해주세요.")]
    EmptyNickname,

    #[error("닉네임이 너무 깁니다. ('{nickname}'은(는) {len}자, 최대 {max}자) 처음부터 다시 시도해주세요.")]
    NicknameTooLong {
        nickname: String,
        len: usize,
        max: usize,
    },

    #[error("가입 진행 시간이 만료되었습니다. 가입 시작 버튼을 다시 눌러주세요.")]
    SessionExpired,

    #[error("알 수 없는 선택지입니다: '{value}'")]
    UnknownOption { value: String },

    #[error("권한 부족: 봇에 '닉네임 관리'와 '역할 관리' 권한이 필요합니다.")]
    Forbidden,

    #[error("처리 중 오류: {message}")]
    Platform { message: String },
}

impl SignupError {
    pub fn kind(&self) -> SignupErrorKind {
        match self {
            SignupError::MissingRole { .. }
            | SignupError::MissingChannel { .. }
            | SignupError::MissingPermission { .. }
            | SignupError::RoleAboveBot { .. }
            | SignupError::BotMemberUnavailable => SignupErrorKind::Configuration,
            SignupError::MissingSelection
            | SignupError::EmptyNickname
            | SignupError::NicknameTooLong { .. }
            | SignupError::SessionExpired
            | SignupError::UnknownOption { .. } => SignupErrorKind::Validation,
            SignupError::Forbidden | SignupError::Platform { .. } => SignupErrorKind::Platform,
        }
    }

    /// Message shown to the member, prefixed by the error class.
    pub fn user_message(&self) -> String {
        match self.kind() {
            SignupErrorKind::Configuration => format!("⚠️ 설정 문제: {}", self),
            SignupErrorKind::Validation => self.to_string(),
            SignupErrorKind::Platform => match self {
                SignupError::Forbidden => format!("🚫 {}", self),
                _ => format!("⚠️ {}", self),
            },
        }
    }
}

impl From<BotError> for SignupError {
    fn from(err: BotError) -> Self {
        match err {
            BotError::PermissionDenied { .. } => SignupError::Forbidden,
            other => SignupError::Platform {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_error_kinds() {
        assert_eq!(
            SignupError::MissingRole { name: "관리자".into() }.kind(),
            SignupErrorKind::Configuration
        );
        assert_eq!(SignupError::EmptyNickname.kind(), SignupErrorKind::Validation);
        assert_eq!(SignupError::Forbidden.kind(), SignupErrorKind::Platform);
    }

    #[test]
    fn test_missing_role_message_names_role() {
        let err = SignupError::MissingRole {
            name: "관리자".to_string(),
        };
        assert!(err.user_message().contains("'관리자'"));
        assert!(err.user_message().starts_with("⚠️ 설정 문제"));
    }

    #[test]
    fn test_permission_denied_maps_to_forbidden() {
        let err: SignupError = BotError::PermissionDenied {
            message: "Missing Permissions".into(),
        }
        .into();
        assert!(matches!(err, SignupError::Forbidden));

        let err: SignupError = BotError::Discord {
            message: "timeout".into(),
        }
        .into();
        assert!(matches!(err, SignupError::Platform { .. }));
        assert!(err.to_string().contains("timeout"));
    }
}
