//! Buttons, menus and the modal used by the signup flow.
//!
//! Routing is by custom id only, so components posted before a restart
//! keep working.

use poise::serenity_prelude::{
    ActionRow, ActionRowComponent, ButtonStyle, CreateActionRow, CreateButton, CreateInputText,
    CreateModal, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, InputTextStyle,
};

use crate::config::NICKNAME_MAX_LEN;
use crate::onboarding::{Grade, ServerNumber};

pub const START_BUTTON_ID: &str = "start_signup_button";
pub const GRADE_SELECT_ID: &str = "grade_select";
pub const SERVER_SELECT_ID: &str = "server_select";
pub const NICKNAME_MODAL_ID: &str = "nickname_modal";
pub const NICKNAME_INPUT_ID: &str = "nickname";

pub fn start_button_row() -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new(START_BUTTON_ID)
        .label("가입 시작")
        .style(ButtonStyle::Primary)])
}

pub fn grade_menu_row() -> CreateActionRow {
    let options = Grade::ALL
        .into_iter()
        .map(|g| {
            CreateSelectMenuOption::new(g.label(), g.value())
                .description(format!("{} 선택", g.label()))
        })
        .collect();

    CreateActionRow::SelectMenu(
        CreateSelectMenu::new(GRADE_SELECT_ID, CreateSelectMenuKind::String { options })
            .placeholder("귀하의 등급은 무엇입니까?")
            .min_values(1)
            .max_values(1),
    )
}

pub fn server_menu_row() -> CreateActionRow {
    let options = ServerNumber::all()
        .map(|s| {
            let name = s.role_name();
            CreateSelectMenuOption::new(name.clone(), name.clone())
                .description(format!("{} 선택", name))
        })
        .collect();

    CreateActionRow::SelectMenu(
        CreateSelectMenu::new(SERVER_SELECT_ID, CreateSelectMenuKind::String { options })
            .placeholder("귀하의 서버숫자를 선택하세요")
            .min_values(1)
            .max_values(1),
    )
}

pub fn nickname_modal() -> CreateModal {
    let input = CreateInputText::new(
        InputTextStyle::Short,
        "귀하의 닉네임을 적어주세요",
        NICKNAME_INPUT_ID,
    )
    .placeholder("예: 주현")
    .max_length(NICKNAME_MAX_LEN as u16)
    .required(true);

    CreateModal::new(NICKNAME_MODAL_ID, "닉네임 입력")
        .components(vec![CreateActionRow::InputText(input)])
}

/// Value of a text input in a submitted modal
pub fn modal_value(rows: &[ActionRow], custom_id: &str) -> Option<String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == custom_id => {
                input.value.clone()
            }
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_menu_lists_all_grades() {
        let json = serde_json::to_string(&grade_menu_row()).unwrap();
        assert!(json.contains(GRADE_SELECT_ID));
        for grade in Grade::ALL {
            assert!(json.contains(grade.label()));
            assert!(json.contains(grade.value()));
        }
    }

    #[test]
    fn test_server_menu_lists_ten_servers() {
        let json = serde_json::to_string(&server_menu_row()).unwrap();
        for n in 1..=10 {
            assert!(json.contains(&format!("\"{}서버\"", n)));
        }
        assert!(!json.contains("11서버"));
    }

    #[test]
    fn test_nickname_modal_limits_length() {
        let json = serde_json::to_value(nickname_modal()).unwrap();
        let text = json.to_string();
        assert!(text.contains(NICKNAME_INPUT_ID));
        assert!(text.contains("\"max_length\":32"));
    }
}
