// src/messages.rs
use crate::onboarding::SignupOutcome;

pub const START_SIGNUP_MESSAGE: &str = "아래 버튼을 눌러 **가입 절차**를 시작하세요.";
pub const GRADE_PROMPT: &str = "귀하의 등급은 무엇입니까? (목록에서 선택)";
pub const SERVER_PROMPT: &str = "귀하의 서버숫자는 몇입니까?";
pub const MEMBER_UNAVAILABLE: &str =
    "멤버 정보를 불러오지 못했습니다. 잠시 후 다시 시도해주세요.";

pub fn install_done_message(channel_mention: &str) -> String {
    format!(
        "✅ 설치 완료: {} 에 메시지를 생성했습니다. 고정(핀)해 두세요.",
        channel_mention
    )
}

pub fn confirmation_message(outcome: &SignupOutcome) -> String {
    let mut lines = vec!["✅ 완료입니다.".to_string()];

    let grade_note = match outcome.grade.role_name() {
        Some(_) => "",
        None => " (길드원은 등급 역할 미부여)",
    };
    lines.push(format!("- 등급: **{}**{}", outcome.grade, grade_note));
    lines.push(format!(
        "- 서버: **{}** (해당 서버 역할 부여)",
        outcome.server
    ));
    lines.push(format!("- 닉네임: **{}**", outcome.nickname));
    if outcome.cleared_initial_role {
        lines.push("- 초기 역할은 자동 해제되었습니다.".to_string());
    }
    if outcome.already_applied {
        lines.push("- 이미 같은 설정이 적용되어 있어 변경 사항이 없습니다.".to_string());
    }
    if !outcome.problems.is_empty() {
        lines.push(String::new());
        lines.push("⚠️ 확인 결과 일부가 예상과 다릅니다. 관리자에게 문의해주세요:".to_string());
        lines.extend(outcome.problems.iter().map(|p| format!("- {}", p)));
    }

    lines.join("\n")
}
