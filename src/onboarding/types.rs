//! Choices a member makes during onboarding and the naming rules derived
//! from them.

use std::fmt;

use crate::config::{NICKNAME_MAX_LEN, SERVER_COUNT};
use crate::error::SignupError;

/// Member grade picked from the first menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    /// 길드원 - gets no grade role
    Member,
    /// 운영진
    Staff,
    /// 관리자
    Admin,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::Member, Grade::Staff, Grade::Admin];

    /// Label shown in the menu and in confirmations
    pub fn label(self) -> &'static str {
        match self {
            Grade::Member => "길드원",
            Grade::Staff => "운영진",
            Grade::Admin => "관리자",
        }
    }

    /// Value carried by the select menu option
    pub fn value(self) -> &'static str {
        match self {
            Grade::Member => "member",
            Grade::Staff => "staff",
            Grade::Admin => "admin",
        }
    }

    /// Guild role granted for this grade, if any
    pub fn role_name(self) -> Option<&'static str> {
        match self {
            Grade::Member => None,
            Grade::Staff | Grade::Admin => Some(self.label()),
        }
    }

    /// Every role name in the grade partition
    pub fn role_names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().filter_map(Grade::role_name)
    }

    /// Parse a menu value; labels are accepted too
    pub fn parse(raw: &str) -> Result<Self, SignupError> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.value() == raw || g.label() == raw)
            .ok_or_else(|| SignupError::UnknownOption {
                value: raw.to_string(),
            })
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Server assignment, 1 through [`SERVER_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerNumber(u8);

impl ServerNumber {
    pub fn new(n: u8) -> Option<Self> {
        (1..=SERVER_COUNT).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Role name and menu label, e.g. "3서버"
    pub fn role_name(self) -> String {
        format!("{}서버", self.0)
    }

    pub fn all() -> impl Iterator<Item = ServerNumber> {
        (1..=SERVER_COUNT).map(ServerNumber)
    }

    /// Every role name in the server partition
    pub fn role_names() -> impl Iterator<Item = String> {
        Self::all().map(ServerNumber::role_name)
    }

    /// Accepts "7" or "7서버"
    pub fn parse(raw: &str) -> Result<Self, SignupError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_suffix("서버").unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .ok()
            .and_then(ServerNumber::new)
            .ok_or_else(|| SignupError::UnknownOption {
                value: trimmed.to_string(),
            })
    }
}

impl fmt::Display for ServerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}서버", self.0)
    }
}

/// Build the display name `"<n>서버/<nickname>"` from raw modal input.
///
/// Surrounding whitespace is trimmed. Empty input and results longer than
/// the platform's nickname limit are rejected.
pub fn compose_nickname(server: ServerNumber, raw: &str) -> Result<String, SignupError> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(SignupError::EmptyNickname);
    }

    let composed = format!("{}/{}", server, nickname);
    let len = composed.chars().count();
    if len > NICKNAME_MAX_LEN {
        return Err(SignupError::NicknameTooLong {
            nickname: composed,
            len,
            max: NICKNAME_MAX_LEN,
        });
    }
    Ok(composed)
}

/// Split a composed display name on its first `/`.
pub fn parse_composed_nickname(display_name: &str) -> Option<(ServerNumber, &str)> {
    let (prefix, nickname) = display_name.split_once('/')?;
    let server = prefix.strip_suffix("서버")?.parse::<u8>().ok()?;
    Some((ServerNumber::new(server)?, nickname))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_parse() {
        assert_eq!(Grade::parse("member").unwrap(), Grade::Member);
        assert_eq!(Grade::parse("운영진").unwrap(), Grade::Staff);
        assert!(matches!(
            Grade::parse("owner"),
            Err(SignupError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_grade_partition() {
        let names: Vec<_> = Grade::role_names().collect();
        assert_eq!(names, vec!["운영진", "관리자"]);
        assert_eq!(Grade::Member.role_name(), None);
    }

    #[test]
    fn test_server_number_bounds() {
        assert!(ServerNumber::new(0).is_none());
        assert!(ServerNumber::new(11).is_none());
        assert_eq!(ServerNumber::all().count(), 10);
        assert_eq!(ServerNumber::parse("7서버").unwrap().get(), 7);
        assert_eq!(ServerNumber::parse("10").unwrap().role_name(), "10서버");
        assert!(ServerNumber::parse("11서버").is_err());
    }

    #[test]
    fn test_compose_nickname_trims() {
        let server = ServerNumber::new(5).unwrap();
        assert_eq!(compose_nickname(server, "  Jiho  ").unwrap(), "5서버/Jiho");
    }

    #[test]
    fn test_compose_nickname_rejects_blank() {
        let server = ServerNumber::new(1).unwrap();
        assert!(matches!(
            compose_nickname(server, "   \t "),
            Err(SignupError::EmptyNickname)
        ));
    }

    #[test]
    fn test_compose_nickname_length_limit() {
        let server = ServerNumber::new(10).unwrap();
        // "10서버/" is five characters
        let fits = "가".repeat(NICKNAME_MAX_LEN - 5);
        assert!(compose_nickname(server, &fits).is_ok());

        let too_long = "가".repeat(NICKNAME_MAX_LEN - 4);
        assert!(matches!(
            compose_nickname(server, &too_long),
            Err(SignupError::NicknameTooLong { len: 33, .. })
        ));
    }

    #[test]
    fn test_parse_composed_nickname() {
        let (server, nick) = parse_composed_nickname("3서버/a/b").unwrap();
        assert_eq!(server.get(), 3);
        assert_eq!(nick, "a/b");
        assert!(parse_composed_nickname("no-slash").is_none());
        assert!(parse_composed_nickname("12서버/x").is_none());
    }
}
