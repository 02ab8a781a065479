//! The 369 counting game.

pub mod plugin;
pub mod rules;

pub use plugin::Game369Plugin;
pub use rules::{answer_for, normalize, GameState, Turn};
