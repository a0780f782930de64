pub mod general;
pub mod signup;

pub use general::ping;
pub use signup::{install_here, install_signup};

use crate::{Data, Error};

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![ping(), install_signup(), install_here()]
}
