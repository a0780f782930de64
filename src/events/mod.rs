pub mod interaction;
pub mod member;
pub mod message;
pub mod ready;

pub use interaction::handle_interaction;
pub use member::{handle_member_add, handle_member_update};
pub use message::handle_message;
pub use ready::log_guild_readiness;
