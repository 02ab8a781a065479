//! irisbot library root.

pub mod bot;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod economy;
pub mod error;
pub mod game369;
pub mod logging;
pub mod meme;
pub mod party;

pub use bot::Bot;
pub use chat::{Announcer, ChatEvent, Plugin, Reply, Router};
pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use db::Database;
pub use error::{Error, Result};
