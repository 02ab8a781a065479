//! Points economy: attendance, profile, shop and the daily lottery.

pub mod commands;
pub mod error;
pub mod lottery;
pub mod scheduler;
pub mod shop;
pub mod users;

pub use commands::EconomyPlugin;
pub use error::EconomyError;
pub use lottery::{LottoCode, RoomDraw};
pub use scheduler::{draw_and_announce, run_lottery_daemon, DrawSchedule};
