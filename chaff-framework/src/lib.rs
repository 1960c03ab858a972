mod action;
mod framework;

pub use action::Action;
pub use framework::{Error, Framework};
